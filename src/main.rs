use anyhow::{Context, Result};
use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tracing::{error, info, warn};

use clarity_coach::{chat, web_server, AnthropicClient, Coach, CompletionConfig};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the Anthropic API (defaults to ANTHROPIC_API_URL or the public endpoint).
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Model used for coach replies (defaults to COACH_MODEL).
    #[arg(long, global = true)]
    model: Option<String>,
    /// Maximum tokens per reply (defaults to COACH_MAX_TOKENS or 1000).
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the coaching web UI.
    Start {
        #[arg(long, env = "COACH_HOST", default_value = "127.0.0.1", help = "Address to bind the web server to.")]
        host: IpAddr,
        #[arg(long, env = "COACH_PORT", default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the HTML templates.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory holding the client assets.")]
        static_dir: PathBuf,
    },
    /// Run a coaching session in the terminal.
    Chat {
        #[arg(long, default_value = ".", help = "Directory where /export writes its file.")]
        export_dir: PathBuf,
    },
}

fn completion_config(cli: &Cli) -> CompletionConfig {
    let mut config = CompletionConfig::from_env();
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.max_tokens = max_tokens;
    }
    config
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for ANTHROPIC_API_KEY and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,clarity_coach=debug).
    // Logs go to stderr so the terminal chat keeps stdout to itself.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Clarity coach starting with command: {:?}", cli.command);

    let config = completion_config(&cli);
    if config.api_key.is_empty() {
        warn!("ANTHROPIC_API_KEY is not set; every reply will fall back to the error message");
    }
    let coach = Arc::new(Coach::new(Arc::new(AnthropicClient::new(config))));

    match cli.command {
        Commands::Start {
            host,
            port,
            templates,
            static_dir,
        } => {
            let addr = SocketAddr::from((host, port));
            let assets = web_server::WebAssets {
                templates_dir: templates,
                static_dir,
            };

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(addr, coach, assets).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { export_dir } => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chat::run_chat(&coach, stdin, tokio::io::stdout(), &export_dir)
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}
