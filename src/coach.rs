//! The coaching session controller.
//!
//! Owns the single [`SessionState`], gates sends behind a busy flag, runs the
//! completion round trip and broadcasts a [`SessionSnapshot`] whenever the
//! state changes so any surface can re-render.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::completion::{CompletionRequest, CompletionService};
use crate::constants::FALLBACK_REPLY;
use crate::export::render_export;
use crate::prompt::build_system_prompt;
use crate::session::{Message, Role, SessionState, Stage};
use crate::stage_controller::analyze_reply;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub stage: Stage,
    pub stage_label: &'static str,
    pub mission: String,
    pub vision: String,
    pub transcript: Vec<Message>,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("still waiting for the previous reply")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The reply was appended and run through the stage controller.
    Replied,
    /// The completion call failed and the fallback message was appended.
    Failed,
    /// The session was reset while the request was in flight.
    Discarded,
}

struct CoachInner {
    state: SessionState,
    busy: bool,
    // Bumped on reset so replies addressed to an old session can be dropped.
    generation: u64,
}

impl CoachInner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.state.stage(),
            stage_label: self.state.stage().label(),
            mission: self.state.mission().to_string(),
            vision: self.state.vision().to_string(),
            transcript: self.state.transcript().to_vec(),
            busy: self.busy,
        }
    }
}

pub struct Coach {
    inner: Mutex<CoachInner>,
    completion: Arc<dyn CompletionService>,
    changes: broadcast::Sender<SessionSnapshot>,
}

impl Coach {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self::with_state(SessionState::new(), completion)
    }

    pub fn with_state(state: SessionState, completion: Arc<dyn CompletionService>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(CoachInner {
                state,
                busy: false,
                generation: 0,
            }),
            completion,
            changes,
        }
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn export(&self, generated: NaiveDate) -> String {
        render_export(&self.inner.lock().await.state, generated)
    }

    /// Sends one user message and waits for the coach's reply.
    ///
    /// Completion failures never escape: they become the fallback assistant
    /// message. The state lock is released while the request is outstanding.
    pub async fn submit(&self, input: &str) -> Result<SubmitOutcome, SubmitRejected> {
        let (request, generation, stage) = {
            let mut inner = self.inner.lock().await;
            if input.trim().is_empty() {
                return Err(SubmitRejected::EmptyInput);
            }
            if inner.busy {
                debug!("Rejecting submission while a reply is pending");
                return Err(SubmitRejected::Busy);
            }

            inner.state.append_message(Role::User, input);
            inner.busy = true;
            let request = CompletionRequest {
                system: build_system_prompt(&inner.state),
                messages: inner.state.transcript().to_vec(),
            };
            self.notify(&inner);
            (request, inner.generation, inner.state.stage())
        };

        info!(%stage, messages = request.messages.len(), "Requesting coach reply");
        let result = self.completion.complete(request).await;

        let mut inner = self.inner.lock().await;
        inner.busy = false;

        if inner.generation != generation {
            warn!("Session was reset while a reply was pending; discarding it");
            self.notify(&inner);
            return Ok(SubmitOutcome::Discarded);
        }

        let outcome = match result {
            Ok(reply) => {
                let decision = analyze_reply(&reply);
                inner.state.append_message(Role::Assistant, reply);
                if decision.apply(&mut inner.state) {
                    info!(
                        stage = %inner.state.stage(),
                        has_mission = !inner.state.mission().is_empty(),
                        has_vision = !inner.state.vision().is_empty(),
                        "Reply advanced the session"
                    );
                }
                SubmitOutcome::Replied
            }
            Err(e) => {
                warn!(error = %e, "Completion failed, appending fallback reply");
                inner.state.append_message(Role::Assistant, FALLBACK_REPLY);
                SubmitOutcome::Failed
            }
        };
        self.notify(&inner);
        Ok(outcome)
    }

    /// Starts a fresh session. A reply still in flight will be discarded.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state.reset();
        inner.generation += 1;
        info!("Session reset");
        self.notify(&inner);
    }

    fn notify(&self, inner: &CoachInner) {
        if self.changes.send(inner.snapshot()).is_err() {
            debug!("No subscribers for session change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionRequestFailure;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Replays canned results and records every request.
    struct Scripted {
        replies: std::sync::Mutex<VecDeque<Result<String, CompletionRequestFailure>>>,
        requests: std::sync::Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, CompletionRequestFailure>>) -> Arc<Self> {
            Arc::new(Self {
                replies: std::sync::Mutex::new(replies.into()),
                requests: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionRequestFailure("no scripted reply".into())))
        }
    }

    /// Holds every request until released.
    struct Gated {
        gate: Notify,
    }

    #[async_trait]
    impl CompletionService for Gated {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionRequestFailure> {
            self.gate.notified().await;
            Ok("Mission: Late.\nVision: Later.".to_string())
        }
    }

    async fn wait_until_busy(coach: &Coach) {
        for _ in 0..100 {
            if coach.snapshot().await.busy {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("coach never became busy");
    }

    #[tokio::test]
    async fn test_failed_completion_appends_fallback_once() {
        let service = Scripted::new(vec![
            Err(CompletionRequestFailure("connection refused".into())),
            Ok("What drives you?".to_string()),
        ]);
        let coach = Coach::new(service.clone());

        let outcome = coach.submit("We sell pottery kits").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Failed);

        let snap = coach.snapshot().await;
        assert_eq!(snap.transcript.len(), 3);
        assert_eq!(snap.transcript[2], Message::new(Role::Assistant, FALLBACK_REPLY));
        assert_eq!(snap.stage, Stage::Explore);
        assert_eq!(snap.mission, "");
        assert_eq!(snap.vision, "");
        assert!(!snap.busy);

        // The busy flag was cleared, so the retry goes through.
        assert_eq!(coach.submit("We sell pottery kits").await, Ok(SubmitOutcome::Replied));
        assert_eq!(coach.snapshot().await.transcript.len(), 5);
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let service = Scripted::new(vec![]);
        let coach = Coach::new(service.clone());
        assert_eq!(coach.submit("   \n\t").await, Err(SubmitRejected::EmptyInput));
        assert_eq!(coach.snapshot().await.transcript.len(), 1);
        assert!(service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_transcript_and_prompt() {
        let service = Scripted::new(vec![Ok("Why now?".to_string())]);
        let coach = Coach::new(service.clone());
        coach.submit("An app for potters").await.unwrap();

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.system.contains("Current stage: explore"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::Assistant);
        assert_eq!(request.messages[1], Message::new(Role::User, "An app for potters"));
    }

    #[tokio::test]
    async fn test_replies_drive_stage_changes() {
        let service = Scripted::new(vec![
            Ok("Great. Let's draft your statements.".to_string()),
            Ok("Mission: Empower creators.\nVision: A world where everyone builds.".to_string()),
        ]);
        let coach = Coach::new(service.clone());

        coach.submit("ready").await.unwrap();
        assert_eq!(coach.snapshot().await.stage, Stage::Draft);

        coach.submit("go on").await.unwrap();
        let snap = coach.snapshot().await;
        assert_eq!(snap.stage, Stage::Refine);
        assert_eq!(snap.stage_label, "Refine");
        assert_eq!(snap.mission, "Empower creators.");
        assert_eq!(snap.vision, "A world where everyone builds.");

        // The second prompt was built while in draft.
        let requests = service.requests.lock().unwrap();
        assert!(requests[1].system.contains("Current stage: draft"));
    }

    #[tokio::test]
    async fn test_second_submit_while_busy_is_rejected() {
        let service = Arc::new(Gated { gate: Notify::new() });
        let coach = Arc::new(Coach::new(service.clone()));

        let first = tokio::spawn({
            let coach = coach.clone();
            async move { coach.submit("first").await }
        });
        wait_until_busy(&coach).await;

        assert_eq!(coach.submit("second").await, Err(SubmitRejected::Busy));

        service.gate.notify_one();
        assert_eq!(first.await.unwrap(), Ok(SubmitOutcome::Replied));

        let snap = coach.snapshot().await;
        assert!(!snap.busy);
        assert_eq!(snap.transcript.len(), 3);
        assert_eq!(snap.stage, Stage::Refine);
    }

    #[tokio::test]
    async fn test_reset_while_pending_discards_reply() {
        let service = Arc::new(Gated { gate: Notify::new() });
        let coach = Arc::new(Coach::new(service.clone()));

        let pending = tokio::spawn({
            let coach = coach.clone();
            async move { coach.submit("first").await }
        });
        wait_until_busy(&coach).await;

        coach.reset().await;
        // Still busy: the old request has not finished yet.
        assert_eq!(coach.submit("too soon").await, Err(SubmitRejected::Busy));

        service.gate.notify_one();
        assert_eq!(pending.await.unwrap(), Ok(SubmitOutcome::Discarded));

        let snap = coach.snapshot().await;
        assert!(!snap.busy);
        assert_eq!(snap.stage, Stage::Explore);
        assert_eq!(snap.mission, "");
        assert_eq!(snap.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_change() {
        let service = Scripted::new(vec![Ok("Tell me more.".to_string())]);
        let coach = Coach::new(service);
        let mut changes = coach.subscribe();

        coach.submit("hello").await.unwrap();

        let sent = changes.recv().await.unwrap();
        assert!(sent.busy);
        assert_eq!(sent.transcript.len(), 2);

        let replied = changes.recv().await.unwrap();
        assert!(!replied.busy);
        assert_eq!(replied.transcript.len(), 3);

        coach.reset().await;
        let reset = changes.recv().await.unwrap();
        assert_eq!(reset.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_export_uses_current_state() {
        let service = Scripted::new(vec![Ok("Mission: Clay for all.\nVision: Mugs everywhere.".to_string())]);
        let coach = Coach::new(service);
        coach.submit("kits").await.unwrap();

        let text = coach.export(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()).await;
        assert!(text.contains("MISSION STATEMENT:\nClay for all."));
        assert!(text.contains("VISION STATEMENT:\nMugs everywhere."));
        assert!(text.contains("USER: kits"));
    }
}
