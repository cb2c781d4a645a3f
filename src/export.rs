use chrono::NaiveDate;

use crate::session::SessionState;

const NOT_DEFINED: &str = "Not yet defined";

/// Renders the session as the plain-text statements document.
pub fn render_export(state: &SessionState, generated: NaiveDate) -> String {
    let conversation = state
        .transcript()
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "MISSION & VISION STATEMENTS\n\
         Generated: {}\n\
         \n\
         MISSION STATEMENT:\n\
         {}\n\
         \n\
         VISION STATEMENT:\n\
         {}\n\
         \n\
         ---\n\
         Full Conversation:\n\
         {}",
        generated.format("%-m/%-d/%Y"),
        or_placeholder(state.mission()),
        or_placeholder(state.vision()),
        conversation
    )
}

fn or_placeholder(text: &str) -> &str {
    if text.is_empty() {
        NOT_DEFINED
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, Stage};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_empty_fields_use_placeholder() {
        let state = SessionState::new();
        let text = render_export(&state, date());
        assert!(text.starts_with("MISSION & VISION STATEMENTS\nGenerated: 3/7/2026\n"));
        assert!(text.contains("MISSION STATEMENT:\nNot yet defined\n"));
        assert!(text.contains("VISION STATEMENT:\nNot yet defined\n"));
    }

    #[test]
    fn test_full_document_layout() {
        let mut state = SessionState::new();
        state.append_message(Role::User, "We make pottery kits.");
        state.append_message(Role::Assistant, "Who are they for?");
        state.set_stage(Stage::Refine);
        state.set_mission("Bring clay to every table.");

        let text = render_export(&state, date());
        let tail = "\n\nVISION STATEMENT:\nNot yet defined\n\n---\nFull Conversation:\nASSISTANT: ";
        assert!(text.contains("MISSION STATEMENT:\nBring clay to every table."));
        assert!(text.contains(tail));
        assert!(text.ends_with("\n\nUSER: We make pottery kits.\n\nASSISTANT: Who are they for?"));
    }
}
