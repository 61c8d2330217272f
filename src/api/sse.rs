//! Server-Sent Events line handling and the Gemini chunk parser
//!
//! Gemini's `streamGenerateContent?alt=sse` emits one event per line:
//! `data: {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}`
//! Each event carries only the new text, so the running answer is a fold over
//! the events in order.

use super::response::GenerateResponse;

pub const DATA_PREFIX: &[u8] = b"data: ";

/// One decoded increment of provider output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// New text to append
    Text(String),
    /// Valid event carrying no text (e.g. a final event with only usage data)
    Empty,
    /// Not valid provider JSON; the stream keeps going
    Malformed(String),
}

/// Return the payload of a significant `data: ` line, without its line terminator.
/// Every other line (comments, `event:` lines, blank keep-alives) yields `None`.
pub fn data_payload(line: &[u8]) -> Option<&[u8]> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_suffix(b"\n").unwrap_or(payload);
    Some(payload.strip_suffix(b"\r").unwrap_or(payload))
}

pub fn parse_fragment(raw: &[u8]) -> StreamFragment {
    match serde_json::from_slice::<GenerateResponse>(raw) {
        Ok(event) => {
            let text = event.candidate_text();
            if text.is_empty() {
                StreamFragment::Empty
            } else {
                StreamFragment::Text(text)
            }
        }
        Err(e) => StreamFragment::Malformed(e.to_string()),
    }
}

/// Apply a decoded fragment to the accumulated answer.
/// Empty and malformed fragments leave it unchanged.
pub fn apply_fragment(fragment: &StreamFragment, accumulated: &str) -> String {
    match fragment {
        StreamFragment::Text(text) => {
            let mut next = String::with_capacity(accumulated.len() + text.len());
            next.push_str(accumulated);
            next.push_str(text);
            next
        }
        StreamFragment::Empty | StreamFragment::Malformed(_) => accumulated.to_string(),
    }
}

/// Fold one raw fragment into the accumulated answer. Pure: logging of
/// malformed input is left to the caller.
pub fn fold_fragment(raw: &[u8], accumulated: &str) -> String {
    apply_fragment(&parse_fragment(raw), accumulated)
}
