// Terminal front end for a coaching session.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::coach::{Coach, SubmitRejected};
use crate::constants::EXPORT_FILENAME;
use crate::session::{Message, Role, Stage};

enum Command<'a> {
    Quit,
    Reset,
    Export(Option<&'a str>),
    Help,
    Say(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        None if trimmed == "/quit" || trimmed == "/exit" => Command::Quit,
        None if trimmed == "/reset" => Command::Reset,
        None if trimmed == "/export" => Command::Export(None),
        None if trimmed == "/help" => Command::Help,
        Some(("/export", path)) => Command::Export(Some(path.trim())),
        _ => Command::Say(line),
    }
}

const HELP: &str = "Commands: /export [path]  /reset  /quit";

async fn print_message<W: AsyncWrite + Unpin>(out: &mut W, msg: &Message) -> Result<()> {
    let speaker = match msg.role {
        Role::User => "You",
        Role::Assistant => "Coach",
    };
    out.write_all(format!("\n{}: {}\n", speaker, msg.content).as_bytes()).await?;
    Ok(())
}

async fn print_stage<W: AsyncWrite + Unpin>(out: &mut W, stage: Stage) -> Result<()> {
    out.write_all(format!("\n[Stage: {}]\n", stage.label()).as_bytes()).await?;
    Ok(())
}

/// Runs the read-eval loop until `/quit` or end of input.
///
/// Exports land in `export_dir` unless `/export` is given an explicit path.
pub async fn run_chat<R, W>(coach: &Coach, input: R, mut out: W, export_dir: &Path) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting coaching chat...");
    let mut lines = input.lines();

    let snapshot = coach.snapshot().await;
    print_stage(&mut out, snapshot.stage).await?;
    for msg in &snapshot.transcript {
        print_message(&mut out, msg).await?;
    }
    out.write_all(format!("\n({})\n", HELP).as_bytes()).await?;

    let mut stage = snapshot.stage;
    loop {
        out.write_all(b"\n> ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Help => {
                out.write_all(format!("{}\n", HELP).as_bytes()).await?;
            }
            Command::Reset => {
                coach.reset().await;
                let snapshot = coach.snapshot().await;
                stage = snapshot.stage;
                print_stage(&mut out, stage).await?;
                for msg in &snapshot.transcript {
                    print_message(&mut out, msg).await?;
                }
            }
            Command::Export(path) => {
                let target = path
                    .map(PathBuf::from)
                    .unwrap_or_else(|| export_dir.join(EXPORT_FILENAME));
                let text = coach.export(Local::now().date_naive()).await;
                tokio::fs::write(&target, text)
                    .await
                    .with_context(|| format!("Failed to write export to {}", target.display()))?;
                info!(path = %target.display(), "Exported statements");
                out.write_all(format!("Saved to {}\n", target.display()).as_bytes()).await?;
            }
            Command::Say(text) => match coach.submit(text).await {
                Ok(_) => {
                    let snapshot = coach.snapshot().await;
                    if let Some(reply) = snapshot.transcript.last() {
                        print_message(&mut out, reply).await?;
                    }
                    if snapshot.stage != stage {
                        stage = snapshot.stage;
                        print_stage(&mut out, stage).await?;
                    }
                }
                Err(SubmitRejected::EmptyInput) => {}
                Err(rejected) => {
                    out.write_all(format!("({})\n", rejected).as_bytes()).await?;
                }
            },
        }
    }

    out.flush().await?;
    info!("Chat session finished.");
    Ok(())
}
