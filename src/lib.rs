//! gemini-relay - Relay Gemini completions to downstream consumers
//!
//! Two delivery modes share one relay:
//!
//! - **Single-shot**: wait for the full answer and return it
//! - **Streaming**: forward the growing answer as Server-Sent Events, flushing
//!   after every provider fragment
//!
//! Every failure is classified into a small, stable [`ErrorKind`] taxonomy
//! before it leaves the crate.

pub mod api;
pub mod config;

pub use api::{
    Answer, AnswerId, ApiKey, Attachment, ChannelConsumer, Consumer, ConversationTurn,
    EndpointResolver, ErrorKind, Flushable, GeminiPayloadBuilder, GeminiRelay, PayloadBuilder,
    RelayError, RelayOptions, Role,
};
pub use config::{Config, ConfigBuilder, ConfigError};
