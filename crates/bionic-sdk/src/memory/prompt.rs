//! Prompt assembly for a user turn.

use bionic_core::{MemoryRecord, SourceType};
use chrono::{DateTime, Local};

/// Preamble used when the configuration does not supply a persona.
pub const DEFAULT_PERSONA: &str = "You are a warm, attentive companion in an ongoing conversation. \
You remember what the user has told you before and bring it up naturally when it helps.";

const EMPTY_HISTORY: &str = "no prior conversation";

/// One `speaker: text` line per recalled record, in the given order.
pub fn format_memory_lines(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return EMPTY_HISTORY.to_string();
    }
    records
        .iter()
        .map(|r| {
            let speaker = match r.metadata.source_type {
                SourceType::User => "user",
                SourceType::Agent => "agent",
                SourceType::Other => "other",
            };
            format!("{}: {}", speaker, r.display_text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the context block handed to the chat model.
pub fn render_prompt(persona: Option<&str>, records: &[MemoryRecord], now: DateTime<Local>) -> String {
    let persona = persona.unwrap_or(DEFAULT_PERSONA);
    format!(
        "{persona}\n\
         \n\
         Current time: {time}\n\
         \n\
         Things you remember from earlier conversations (oldest first):\n\
         {history}\n\
         \n\
         When replying:\n\
         - Answer the latest message first and keep it conversational\n\
         - Use remembered details only where they are relevant\n\
         - If the memories conflict with the latest message, trust the latest message",
        time = now.format("%Y-%m-%d %H:%M:%S"),
        history = format_memory_lines(records),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bionic_core::RecordMetadata;
    use chrono::{TimeZone, Utc};

    fn record(summary: &str, content: &str, source: SourceType) -> MemoryRecord {
        MemoryRecord::new(
            "id",
            summary,
            RecordMetadata::fresh(content, source, "alice", Utc::now()),
        )
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(format_memory_lines(&[]), "no prior conversation");
    }

    #[test]
    fn test_memory_lines_by_speaker() {
        let records = vec![
            record("I like hiking", "I like hiking", SourceType::User),
            record("", "Hiking sounds lovely", SourceType::Agent),
            record("weather alert", "weather alert", SourceType::Other),
        ];
        assert_eq!(
            format_memory_lines(&records),
            "user: I like hiking\nagent: Hiking sounds lovely\nother: weather alert"
        );
    }

    #[test]
    fn test_render_prompt() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let prompt = render_prompt(Some("You are Ada."), &[], now);
        assert!(prompt.starts_with("You are Ada."));
        assert!(prompt.contains("Current time: 2024-05-01 09:30:00"));
        assert!(prompt.contains("no prior conversation"));

        let prompt = render_prompt(None, &[], now);
        assert!(prompt.starts_with(DEFAULT_PERSONA));
    }
}
