use serde::Serialize;
use std::fmt;

/// Seeded into a brand-new session.
pub const WELCOME_MESSAGE: &str = "Welcome! I'm your Mission & Vision Clarity Coach.

Over the next 10 minutes, I'll guide you through discovering and articulating your startup's core purpose and future direction.

We'll move through three stages:
1. **Explore** - Uncover your deeper motivations
2. **Draft** - Shape your mission and vision
3. **Refine** - Polish your statements

Ready to find clarity? Tell me: **What's your startup about in one sentence?**";

/// Seeded after an explicit reset.
pub const WELCOME_BACK_MESSAGE: &str = "Welcome back! Ready to dive deeper or start fresh?

Tell me: **What's your startup about in one sentence?**";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Conversation phase. Declaration order is the progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Welcome,
    Explore,
    Draft,
    Refine,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Explore => "explore",
            Stage::Draft => "draft",
            Stage::Refine => "refine",
        }
    }

    /// Capitalized form shown in the stage indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Welcome => "Welcome",
            Stage::Explore => "Explore",
            Stage::Draft => "Draft",
            Stage::Refine => "Refine",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory state of the single coaching session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    transcript: Vec<Message>,
    stage: Stage,
    mission: String,
    vision: String,
}

impl SessionState {
    pub fn new() -> Self {
        Self::seeded(WELCOME_MESSAGE)
    }

    // The welcome stage is transient: seeding moves straight to explore.
    fn seeded(greeting: &str) -> Self {
        let mut state = Self {
            transcript: Vec::new(),
            stage: Stage::Welcome,
            mission: String::new(),
            vision: String::new(),
        };
        state.append_message(Role::Assistant, greeting);
        state.set_stage(Stage::Explore);
        state
    }

    pub fn append_message(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(Message::new(role, content));
    }

    /// Advances the stage. Moving backwards is only possible through [`reset`](Self::reset),
    /// so an earlier target is ignored.
    pub fn set_stage(&mut self, stage: Stage) {
        if stage < self.stage {
            tracing::debug!(current = %self.stage, requested = %stage, "Ignoring backward stage change");
            return;
        }
        self.stage = stage;
    }

    pub fn set_mission(&mut self, text: impl Into<String>) {
        self.mission = text.into();
    }

    pub fn set_vision(&mut self, text: impl Into<String>) {
        self.vision = text.into();
    }

    pub fn reset(&mut self) {
        *self = Self::seeded(WELCOME_BACK_MESSAGE);
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn mission(&self) -> &str {
        &self.mission
    }

    pub fn vision(&self) -> &str {
        &self.vision
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
