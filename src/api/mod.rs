//! Gemini relay: request dispatch, response decoding and SSE forwarding

mod client;
mod endpoint;
mod payload;
mod request;
mod response;
mod sse;
mod streaming;
mod title;

pub use client::{GeminiRelay, RelayOptions, RelayState};
pub use endpoint::{ApiKey, Endpoint, EndpointResolver, DEFAULT_BASE_URL};
pub use payload::{GeminiPayloadBuilder, PayloadBuilder};
pub use request::{Attachment, ConversationTurn, Role};
pub use response::{extract_answer_text, Answer, AnswerId, GenerateResponse};
pub use sse::{
    apply_fragment, data_payload, fold_fragment, parse_fragment, StreamFragment, DATA_PREFIX,
};
pub use streaming::{
    set_sse_headers, BufferedConsumer, ChannelConsumer, Consumer, Flushable, PartialDelivery,
    StdoutConsumer,
};
pub use title::{clean_label, TITLE_INSTRUCTION};

use serde::Serialize;
use thiserror::Error;

/// Stable classification of every failure the relay can surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Credential or other required configuration is missing
    Configuration,
    /// Required input text was empty
    ValidationInvalidInput,
    /// Request could not be sent, or the response could not be read
    TransportFailure,
    /// Provider answered with a non-success status
    ProviderError,
    /// Response body was not the expected JSON shape
    DecodeFailure,
    /// Well-formed response without usable text
    EmptyAnswer,
    /// Consumer cannot be flushed incrementally
    StreamUnsupported,
    /// Forwarding to the consumer failed (usually a disconnect)
    ConsumerWriteFailure,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::ValidationInvalidInput => "VALIDATION_INVALID_INPUT",
            ErrorKind::TransportFailure => "TRANSPORT_FAILURE",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
            ErrorKind::DecodeFailure => "DECODE_FAILURE",
            ErrorKind::EmptyAnswer => "EMPTY_ANSWER",
            ErrorKind::StreamUnsupported => "STREAM_UNSUPPORTED",
            ErrorKind::ConsumerWriteFailure => "CONSUMER_WRITE_FAILURE",
        }
    }

    /// HTTP status a server front-end should answer with for this kind
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::ValidationInvalidInput => 400,
            ErrorKind::Configuration | ErrorKind::StreamUnsupported => 500,
            ErrorKind::ConsumerWriteFailure => 499,
            ErrorKind::TransportFailure
            | ErrorKind::ProviderError
            | ErrorKind::DecodeFailure
            | ErrorKind::EmptyAnswer => 502,
        }
    }
}

/// A classified relay failure.
///
/// `Display` renders only the user-safe message; `debug` holds raw bodies or
/// underlying error text and is meant for logs. Neither ever contains the API key.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RelayError {
    pub kind: ErrorKind,
    pub message: String,
    pub debug: Option<String>,
    /// Text accumulated before a streaming failure, only when the caller asked for it
    pub partial: Option<String>,
}

impl RelayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            debug: None,
            partial: None,
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    pub fn with_partial(mut self, partial: impl Into<String>) -> Self {
        self.partial = Some(partial.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationInvalidInput, message)
    }

    pub fn empty_answer() -> Self {
        Self::new(ErrorKind::EmptyAnswer, "Empty response from Gemini")
    }

    pub fn stream_unsupported() -> Self {
        Self::new(ErrorKind::StreamUnsupported, "Streaming unsupported by client")
    }

    /// Request could not be sent or its body could not be read.
    ///
    /// The URL is stripped before rendering so nothing request-specific leaks.
    pub fn transport(context: &str, err: reqwest::Error) -> Self {
        Self::new(ErrorKind::TransportFailure, context).with_debug(err.without_url().to_string())
    }

    /// Mid-stream read failure from any byte source
    pub fn stream_read(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::TransportFailure, "Error reading stream").with_debug(err.to_string())
    }

    pub fn provider_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ProviderError,
            format!("Gemini API error: {}", status),
        )
        .with_debug(body)
    }

    pub fn decode(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::DecodeFailure, "Failed to parse Gemini response")
            .with_debug(err.to_string())
    }

    pub fn consumer_write(err: std::io::Error) -> Self {
        Self::new(
            ErrorKind::ConsumerWriteFailure,
            "Failed to forward response to client",
        )
        .with_debug(err.to_string())
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
