//! Thread transcripts as display lines.

use anyhow::{Context, Result};

use crate::remote::{RemoteJobService, ThreadMessage};

/// Body used for a message with no text content.
pub const NO_TEXT_PLACEHOLDER: &str = "<no text content>";

/// Render one message as `"[{role}] {text}"`, joining text parts with `\n`.
pub fn render_message(message: &ThreadMessage) -> String {
    let parts: Vec<&str> = message.text_parts().collect();
    let body = if parts.is_empty() {
        NO_TEXT_PLACEHOLDER.to_string()
    } else {
        parts.join("\n")
    };
    format!("[{}] {body}", message.role)
}

pub fn render_transcript(messages: &[ThreadMessage]) -> Vec<String> {
    messages.iter().map(render_message).collect()
}

/// Fetch and render every message on a thread, oldest first.
pub async fn fetch_transcript(service: &dyn RemoteJobService, thread_id: &str) -> Result<Vec<String>> {
    let messages = service
        .list_messages(thread_id)
        .await
        .with_context(|| format!("failed to read transcript of thread {thread_id}"))?;
    Ok(render_transcript(&messages))
}

/// Whether a transcript line was written by an agent.
///
/// The role may come through as an enum name (`MessageRole.AGENT`) or as a
/// bare token in any case.
pub fn is_agent_line(line: &str) -> bool {
    if line.contains("MessageRole.AGENT") {
        return true;
    }
    let lower = line.to_lowercase();
    lower.starts_with("[assistant]") || lower.starts_with("[agent]")
}

/// The agent-authored lines of a transcript, or the whole transcript if
/// there are none.
pub fn agent_lines(transcript: &[String]) -> Vec<String> {
    let filtered: Vec<String> = transcript
        .iter()
        .filter(|line| is_agent_line(line))
        .cloned()
        .collect();
    if filtered.is_empty() {
        transcript.to_vec()
    } else {
        filtered
    }
}
