//! Answer structures and the Gemini response envelope

use super::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlates every partial and final delivery of one answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerId(String);

impl AnswerId {
    /// Fresh id for a new answer
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Regeneration reuses the existing id; a new answer gets a fresh one
    pub fn for_request(existing: &str, regenerate: bool) -> Self {
        if regenerate && !existing.is_empty() {
            Self(existing.to_string())
        } else {
            Self::generate()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AnswerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AnswerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of one completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Set by the caller for single-shot answers; always present on streamed ones
    pub id: Option<AnswerId>,

    /// Accumulated answer text
    pub text: String,

    /// Whether the stream was cut off by the line cap rather than ending on its own
    #[serde(default)]
    pub truncated: bool,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            truncated: false,
        }
    }

    pub fn with_id(mut self, id: AnswerId) -> Self {
        self.id = Some(id);
        self
    }
}

/// `generateContent` response body; streamed SSE events share the same shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    fn first_content(&self) -> Option<&Content> {
        self.candidates.first()?.content.as_ref()
    }

    /// First candidate's first text part
    pub fn first_text(&self) -> Option<&str> {
        self.first_content()?.parts.first()?.text.as_deref()
    }

    /// Concatenated text of every part of the first candidate
    pub fn candidate_text(&self) -> String {
        self.first_content()
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

/// Decode a full single-shot body and pull out the answer text.
///
/// A missing candidate or whitespace-only text is an `EmptyAnswer`, never an
/// empty success.
pub fn extract_answer_text(body: &[u8]) -> Result<String, RelayError> {
    let envelope: GenerateResponse = serde_json::from_slice(body).map_err(RelayError::decode)?;
    match envelope.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(RelayError::empty_answer()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;

    #[test]
    fn test_extract_first_candidate_text() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"Hello there"},{"text":"ignored"}],"role":"model"},"finishReason":"STOP"}]}"#;
        assert_eq!(extract_answer_text(body).unwrap(), "Hello there");
    }

    #[test]
    fn test_missing_candidates_is_empty_answer() {
        let err = extract_answer_text(br#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyAnswer);
    }

    #[test]
    fn test_blank_text_is_empty_answer() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"  \n "}]}}]}"#;
        let err = extract_answer_text(body).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyAnswer);
    }

    #[test]
    fn test_candidate_without_parts_is_empty_answer() {
        let body = br#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert_eq!(extract_answer_text(body).unwrap_err().kind, ErrorKind::EmptyAnswer);
    }

    #[test]
    fn test_invalid_json_is_decode_failure() {
        let err = extract_answer_text(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_answer_id_regenerate_reuses() {
        assert_eq!(AnswerId::for_request("abc", true).as_str(), "abc");
        let fresh = AnswerId::for_request("abc", false);
        assert_ne!(fresh.as_str(), "abc");
        assert_eq!(fresh.as_str().len(), 36);
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let envelope: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"inlineData":{}},{"text":"b"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.candidate_text(), "ab");
    }
}
