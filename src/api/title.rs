//! Short label (chat title) generation on top of the single-shot path

use super::{ConversationTurn, GeminiRelay, RelayError};
use tracing::debug;

pub const TITLE_INSTRUCTION: &str = "Generate a concise and descriptive title (max 10 words) for this chat conversation, no special characters.";

impl GeminiRelay {
    /// Derive a short label from a conversation transcript.
    ///
    /// Credential and input are checked before any network call.
    pub async fn generate_short_label(
        &self,
        model: &str,
        transcript: &str,
    ) -> Result<String, RelayError> {
        self.resolver().ensure_credential()?;
        if transcript.trim().is_empty() {
            return Err(RelayError::invalid_input("chat text cannot be empty"));
        }

        let messages = [
            ConversationTurn::user(TITLE_INSTRUCTION),
            ConversationTurn::user(transcript),
        ];
        let answer = self
            .single_shot(model, &messages, &[], self.options().label_timeout)
            .await?;

        let label = clean_label(&answer.text, self.options().label_max_chars)
            .ok_or_else(|| RelayError::empty_answer().with_debug(answer.text.clone()))?;
        debug!(model, label = %label, "generated label");
        Ok(label)
    }
}

/// Trim, strip one layer of enclosing quotes and the `*` emphasis markers inside
/// them, then cut to `max_chars` characters. `None` when nothing is left.
pub fn clean_label(raw: &str, max_chars: usize) -> Option<String> {
    let label = raw.trim();
    let label = label.strip_prefix('"').unwrap_or(label);
    let label = label.strip_suffix('"').unwrap_or(label);
    let label = label.trim_matches('*').trim();
    if label.is_empty() {
        return None;
    }
    Some(label.chars().take(max_chars).collect())
}
