//! Mission & Vision Clarity Coach.
//!
//! A staged founder conversation (explore, draft, refine) driven by an LLM
//! completion endpoint. Local code tracks the session, mirrors the model's
//! progress into a stage, extracts the drafted statements and exports them.

pub mod chat;
pub mod coach;
pub mod completion;
pub mod constants;
pub mod export;
pub mod prompt;
pub mod session;
pub mod stage_controller;
pub mod web_server;

pub use coach::{Coach, SessionSnapshot, SubmitOutcome, SubmitRejected};
pub use completion::{AnthropicClient, CompletionConfig, CompletionRequest, CompletionRequestFailure, CompletionService};
pub use session::{Message, Role, SessionState, Stage};
pub use stage_controller::{analyze_reply, StageDecision};
