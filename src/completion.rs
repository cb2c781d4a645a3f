use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::constants;
use crate::session::Message;

/// Any failure talking to the completion endpoint. Transport errors, non-2xx
/// statuses and unparseable bodies are deliberately not distinguished.
#[derive(Debug, thiserror::Error)]
#[error("completion request failed: {0}")]
pub struct CompletionRequestFailure(pub String);

impl From<reqwest::Error> for CompletionRequestFailure {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the text of the assistant reply.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionRequestFailure>;
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: constants::ANTHROPIC_API_URL.clone(),
            api_key: constants::ANTHROPIC_API_KEY.clone(),
            model: constants::COACH_MODEL.clone(),
            max_tokens: *constants::COACH_MAX_TOKENS,
        }
    }
}

// Structures matching the Anthropic Messages API
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

// Only text blocks make up the reply; anything else (tool use, thinking) is skipped.
fn reply_text(body: MessagesResponse) -> String {
    body.content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    config: CompletionConfig,
}

impl AnthropicClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for AnthropicClient {
    #[instrument(skip_all, fields(messages = request.messages.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
        let url = self.endpoint();
        let payload = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: &request.system,
            messages: &request.messages,
        };

        debug!(model = %self.config.model, system_len = request.system.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", constants::ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Completion API request failed");
            return Err(CompletionRequestFailure(format!("status {}: {}", status, error_body)));
        }

        let reply = reply_text(response.json::<MessagesResponse>().await?);

        debug!(reply_len = reply.len(), "Received completion reply");
        Ok(reply)
    }
}
