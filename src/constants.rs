// Defaults loaded from the environment (a `.env` file is read in main).
// CLI flags take precedence over these.

use std::env;

lazy_static::lazy_static! {
    pub static ref ANTHROPIC_API_URL: String = env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| "https://api.anthropic.com".to_string());
    pub static ref ANTHROPIC_API_KEY: String = env::var("ANTHROPIC_API_KEY").unwrap_or_default();
    pub static ref COACH_MODEL: String = env::var("COACH_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
    pub static ref COACH_MAX_TOKENS: u32 = env::var("COACH_MAX_TOKENS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
}

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const FALLBACK_REPLY: &str = "I encountered an error. Please try again.";

pub const EXPORT_FILENAME: &str = "mission-vision-statements.txt";
