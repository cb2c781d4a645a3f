//! Mirrors the coach model's progress into the local session.
//!
//! The model is the authority on where the conversation is; this module only
//! looks for the phrases the system prompt asks it to use and for labelled
//! `Mission:`/`Vision:` drafts. Matching is plain case-insensitive substring
//! search, deliberately loose.

use lazy_static::lazy_static;
use regex::Regex;

use crate::session::{SessionState, Stage};

const DRAFT_TRIGGERS: [&str; 2] = ["let's draft", "draft your"];

lazy_static! {
    static ref MISSION_PATTERN: Regex =
        Regex::new(r"(?is)mission[:\s]+(.+?)(?:vision|$)").expect("mission pattern is valid");
    static ref VISION_PATTERN: Regex =
        Regex::new(r"(?is)vision[:\s]+(.+?)$").expect("vision pattern is valid");
}

/// What a single assistant reply asks of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageDecision {
    NoChange,
    Draft,
    /// Both labels were present. Either capture may still be missing.
    Refine {
        mission: Option<String>,
        vision: Option<String>,
    },
}

/// Inspects an assistant reply. A draft trigger wins over labelled statements
/// in the same reply, and extraction is skipped for it.
pub fn analyze_reply(reply: &str) -> StageDecision {
    let lower = reply.to_lowercase();

    if DRAFT_TRIGGERS.iter().any(|phrase| lower.contains(phrase)) {
        return StageDecision::Draft;
    }

    if lower.contains("mission:") && lower.contains("vision:") {
        return StageDecision::Refine {
            mission: capture(&MISSION_PATTERN, reply),
            vision: capture(&VISION_PATTERN, reply),
        };
    }

    StageDecision::NoChange
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

impl StageDecision {
    /// Applies the decision. Returns `true` if anything in `state` changed.
    pub fn apply(self, state: &mut SessionState) -> bool {
        let before = (state.stage(), state.mission().to_string(), state.vision().to_string());
        match self {
            StageDecision::NoChange => return false,
            StageDecision::Draft => state.set_stage(Stage::Draft),
            StageDecision::Refine { mission, vision } => {
                state.set_stage(Stage::Refine);
                if let Some(mission) = mission {
                    state.set_mission(mission);
                }
                if let Some(vision) = vision {
                    state.set_vision(vision);
                }
            }
        }
        before.0 != state.stage() || before.1 != state.mission() || before.2 != state.vision()
    }
}
