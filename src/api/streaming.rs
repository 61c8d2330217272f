//! Downstream consumer seam for streamed answers
//!
//! A consumer is whatever the answer is relayed to (an HTTP response body in a
//! server, stdout in the CLI). Incremental delivery needs the `Flushable`
//! capability; consumers without it are refused up front rather than buffered.

use super::AnswerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Headers sent ahead of the first event
pub const SSE_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("Transfer-Encoding", "chunked"),
];

/// Receiving end of a relayed answer
pub trait Consumer: Send {
    fn set_header(&mut self, name: &str, value: &str);

    /// The incremental-write capability, if this consumer has it
    fn as_flushable(&mut self) -> Option<&mut dyn Flushable> {
        None
    }
}

/// A consumer that can push bytes out immediately
#[async_trait]
pub trait Flushable: Send {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Guarantee nothing written so far is held in an intermediate buffer
    async fn flush(&mut self) -> io::Result<()>;
}

pub fn set_sse_headers(consumer: &mut dyn Consumer) {
    for (name, value) in SSE_HEADERS {
        consumer.set_header(name, value);
    }
}

/// One forwarded partial answer, in chat-completion-chunk shape.
/// `content` always carries the cumulative text, not a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDelivery {
    pub id: String,
    pub object: String,
    pub choices: Vec<DeliveryChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryChoice {
    pub index: u32,
    pub delta: DeliveryDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDelta {
    pub role: String,
    pub content: String,
}

impl PartialDelivery {
    pub fn new(id: &AnswerId, text: &str) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            choices: vec![DeliveryChoice {
                index: 0,
                delta: DeliveryDelta {
                    role: "assistant".to_string(),
                    content: text.to_string(),
                },
            }],
        }
    }

    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.delta.content.as_str())
            .unwrap_or("")
    }

    /// Encode as a complete SSE event: `data: <json>\n\n`
    pub fn to_event(&self) -> Result<Vec<u8>, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        let mut event = Vec::with_capacity(json.len() + 8);
        event.extend_from_slice(b"data: ");
        event.extend_from_slice(&json);
        event.extend_from_slice(b"\n\n");
        Ok(event)
    }

    /// Parse an event previously produced by `to_event`
    pub fn from_event(event: &[u8]) -> Option<Self> {
        let payload = event.strip_prefix(b"data: ")?;
        let payload = payload.strip_suffix(b"\n\n").unwrap_or(payload);
        serde_json::from_slice(payload).ok()
    }
}

/// Flushable consumer that hands each flushed event to a channel.
///
/// Bridges the relay to any HTTP framework: the receiver side becomes the
/// response body stream. A dropped receiver reads as a client disconnect.
pub struct ChannelConsumer {
    headers: Vec<(String, String)>,
    pending: Vec<u8>,
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelConsumer {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(buffer);
        let consumer = Self {
            headers: Vec::new(),
            pending: Vec::new(),
            tx,
        };
        (consumer, rx)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl Consumer for ChannelConsumer {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn as_flushable(&mut self) -> Option<&mut dyn Flushable> {
        Some(self)
    }
}

#[async_trait]
impl Flushable for ChannelConsumer {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.tx.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"));
        }
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.pending);
        self.tx
            .send(chunk)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

/// Collects everything in memory; cannot stream incrementally
#[derive(Debug, Default)]
pub struct BufferedConsumer {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl BufferedConsumer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Consumer for BufferedConsumer {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

/// Writes events straight to stdout
pub struct StdoutConsumer {
    out: tokio::io::Stdout,
}

impl StdoutConsumer {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl Consumer for StdoutConsumer {
    fn set_header(&mut self, name: &str, value: &str) {
        debug!("{}: {}", name, value);
    }

    fn as_flushable(&mut self) -> Option<&mut dyn Flushable> {
        Some(self)
    }
}

#[async_trait]
impl Flushable for StdoutConsumer {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.out.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_event_shape() {
        let id = AnswerId::from("answer-1");
        let event = PartialDelivery::new(&id, "Hello").to_event().unwrap();
        let text = String::from_utf8(event.clone()).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));

        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["id"], "answer-1");
        assert_eq!(json["choices"][0]["delta"]["content"], "Hello");

        let parsed = PartialDelivery::from_event(&event).unwrap();
        assert_eq!(parsed.content(), "Hello");
    }

    #[test]
    fn test_buffered_consumer_not_flushable() {
        let mut consumer = BufferedConsumer::new();
        assert!(consumer.as_flushable().is_none());
    }

    #[test]
    fn test_sse_headers_applied() {
        let mut consumer = BufferedConsumer::new();
        set_sse_headers(&mut consumer);
        assert!(consumer
            .headers
            .contains(&("Content-Type".to_string(), "text/event-stream".to_string())));
        assert!(consumer
            .headers
            .contains(&("Cache-Control".to_string(), "no-cache".to_string())));
        assert!(consumer.body.is_empty());
    }

    #[tokio::test]
    async fn test_channel_consumer_delivers_on_flush() {
        let (mut consumer, mut rx) = ChannelConsumer::new(4);
        let sink = consumer.as_flushable().unwrap();
        sink.write(b"data: one\n\n").await.unwrap();
        assert!(rx.try_recv().is_err());
        sink.flush().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"data: one\n\n".to_vec());
    }

    #[tokio::test]
    async fn test_channel_consumer_disconnect() {
        let (mut consumer, rx) = ChannelConsumer::new(4);
        drop(rx);
        let sink = consumer.as_flushable().unwrap();
        let err = sink.write(b"data: x\n\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
