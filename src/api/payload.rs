//! Request body construction for the Gemini generateContent API
//!
//! Gemini differs from OpenAI-style chat bodies:
//! - `contents` instead of `messages`, each with a `parts` array
//! - roles are `user` and `model`; system turns go to `system_instruction`
//! - binary files travel as `inline_data` parts with base64 payloads

use super::{Attachment, ConversationTurn, ErrorKind, RelayError, Role};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

/// Turns a conversation into a provider request body
pub trait PayloadBuilder: Send + Sync {
    fn build(
        &self,
        messages: &[ConversationTurn],
        attachments: &[Attachment],
    ) -> Result<Vec<u8>, RelayError>;
}

/// Default builder producing Gemini `generateContent` bodies
#[derive(Debug, Clone, Default)]
pub struct GeminiPayloadBuilder;

impl GeminiPayloadBuilder {
    fn attachment_part(attachment: &Attachment) -> Value {
        if attachment.is_text() {
            let text = String::from_utf8_lossy(&attachment.data);
            json!({ "text": format!("### {}\n```\n{}\n```", attachment.name, text) })
        } else {
            json!({
                "inline_data": {
                    "mime_type": attachment.mime_type,
                    "data": STANDARD.encode(&attachment.data),
                }
            })
        }
    }

    fn build_value(messages: &[ConversationTurn], attachments: &[Attachment]) -> Value {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Model => "model",
                Role::System => {
                    system_parts.push(&msg.content);
                    continue;
                }
            };
            contents.push(json!({
                "role": role,
                "parts": [{ "text": msg.content }],
            }));
        }

        if !attachments.is_empty() {
            let parts: Vec<Value> = attachments.iter().map(Self::attachment_part).collect();
            // Files ride along with the latest user turn
            match contents
                .iter_mut()
                .rev()
                .find(|c| c["role"].as_str() == Some("user"))
            {
                Some(turn) => {
                    if let Some(existing) = turn["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                None => contents.push(json!({ "role": "user", "parts": parts })),
            }
        }

        let mut body = json!({ "contents": contents });
        if !system_parts.is_empty() {
            body["system_instruction"] = json!({
                "parts": [{ "text": system_parts.join("\n\n") }]
            });
        }
        body
    }
}

impl PayloadBuilder for GeminiPayloadBuilder {
    fn build(
        &self,
        messages: &[ConversationTurn],
        attachments: &[Attachment],
    ) -> Result<Vec<u8>, RelayError> {
        if messages.is_empty() {
            return Err(RelayError::invalid_input("conversation cannot be empty"));
        }
        let body = Self::build_value(messages, attachments);
        serde_json::to_vec(&body).map_err(|e| {
            RelayError::new(ErrorKind::DecodeFailure, "Failed to generate Gemini payload")
                .with_debug(e.to_string())
        })
    }
}
