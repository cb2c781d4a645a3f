#![allow(dead_code)]

use async_trait::async_trait;
use clarity_coach::{CompletionRequest, CompletionRequestFailure, CompletionService};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Replays canned replies in order; fails once they run out.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionRequestFailure>>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String, CompletionRequestFailure>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionRequestFailure("script exhausted".into())))
    }
}

/// Blocks every request until `release` is called.
pub struct GatedCompletion {
    gate: Notify,
}

impl GatedCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { gate: Notify::new() })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl CompletionService for GatedCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
        self.gate.notified().await;
        Ok("Tell me more.".to_string())
    }
}
