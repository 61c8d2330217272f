//! Gemini response relay: single-shot and SSE streaming paths

use super::endpoint::{Endpoint, EndpointResolver};
use super::payload::{GeminiPayloadBuilder, PayloadBuilder};
use super::response::extract_answer_text;
use super::sse::{apply_fragment, data_payload, parse_fragment, StreamFragment};
use super::streaming::{set_sse_headers, Consumer, Flushable, PartialDelivery};
use super::{Answer, AnswerId, ApiKey, Attachment, ConversationTurn, ErrorKind, RelayError};
use crate::config::Config;
use futures_util::{pin_mut, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for one relay instance
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Ceiling on lines read from one stream; a provider that never ends its
    /// stream is cut off here and the answer is returned as truncated
    pub max_stream_lines: usize,
    /// Attach accumulated text to streaming errors
    pub keep_partial_on_error: bool,
    /// Whole-exchange timeout for full generations
    pub generation_timeout: Duration,
    /// Whole-exchange timeout for short-label generation
    pub label_timeout: Duration,
    /// Maximum characters in a generated label
    pub label_max_chars: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            max_stream_lines: 10_000,
            keep_partial_on_error: false,
            generation_timeout: Duration::from_secs(300),
            label_timeout: Duration::from_secs(60),
            label_max_chars: 100,
        }
    }
}

/// Lifecycle of one relayed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Built,
    Sent,
    Streaming,
    Buffered,
    Complete,
    Failed,
}

/// Tracks and logs state transitions for a single exchange
struct Exchange<'a> {
    model: &'a str,
    state: RelayState,
}

impl<'a> Exchange<'a> {
    fn new(model: &'a str) -> Self {
        debug!(model, state = ?RelayState::Built, "relay request built");
        Self {
            model,
            state: RelayState::Built,
        }
    }

    fn advance(&mut self, next: RelayState) {
        debug!(model = self.model, from = ?self.state, to = ?next, "relay state");
        self.state = next;
    }

    fn fail(&mut self, err: RelayError) -> RelayError {
        warn!(
            model = self.model,
            from = ?self.state,
            code = err.code(),
            "relay failed: {}",
            err
        );
        self.state = RelayState::Failed;
        err
    }
}

/// Relays Gemini completions to callers.
///
/// Holds only immutable configuration and a shared HTTP client, so one instance
/// serves any number of concurrent requests.
#[derive(Clone)]
pub struct GeminiRelay {
    resolver: EndpointResolver,
    payload: Arc<dyn PayloadBuilder>,
    client: Client,
    options: RelayOptions,
}

impl GeminiRelay {
    pub fn new(resolver: EndpointResolver, options: RelayOptions) -> Self {
        Self {
            resolver,
            payload: Arc::new(GeminiPayloadBuilder),
            client: Client::new(),
            options,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let key = config.gemini_api_key().and_then(ApiKey::new);
        let resolver = EndpointResolver::new(config.gemini.base_url.clone(), key);
        Self::new(resolver, config.relay_options())
    }

    /// Swap in a different payload builder
    pub fn with_payload_builder(mut self, payload: Arc<dyn PayloadBuilder>) -> Self {
        self.payload = payload;
        self
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub(super) fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    fn build_request(&self, endpoint: &Endpoint, body: Vec<u8>, timeout: Duration) -> RequestBuilder {
        let request = self
            .client
            .post(&endpoint.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body);
        endpoint.authorize(request)
    }

    /// Wait for the full answer. The returned answer carries no id; the caller assigns one.
    pub async fn run_single_shot(
        &self,
        model: &str,
        messages: &[ConversationTurn],
        attachments: &[Attachment],
    ) -> Result<Answer, RelayError> {
        self.single_shot(model, messages, attachments, self.options.generation_timeout)
            .await
    }

    pub(super) async fn single_shot(
        &self,
        model: &str,
        messages: &[ConversationTurn],
        attachments: &[Attachment],
        timeout: Duration,
    ) -> Result<Answer, RelayError> {
        let endpoint = self.resolver.resolve(model, false)?;
        let body = self.payload.build(messages, attachments)?;
        let request = self.build_request(&endpoint, body, timeout);
        let mut exchange = Exchange::new(model);

        let response = request
            .send()
            .await
            .map_err(|e| exchange.fail(RelayError::transport("Failed to send Gemini API request", e)))?;
        exchange.advance(RelayState::Sent);

        let response = ensure_success(response)
            .await
            .map_err(|e| exchange.fail(e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| exchange.fail(RelayError::transport("Failed to read Gemini response", e)))?;
        exchange.advance(RelayState::Buffered);

        let text = extract_answer_text(&body).map_err(|e| exchange.fail(e))?;
        exchange.advance(RelayState::Complete);
        info!(model, chars = text.chars().count(), "single-shot answer complete");

        Ok(Answer::new(text))
    }

    /// Stream the answer to `consumer` as SSE events, one per significant line.
    ///
    /// On success the returned answer equals the last value forwarded.
    pub async fn run_streaming(
        &self,
        consumer: &mut dyn Consumer,
        model: &str,
        messages: &[ConversationTurn],
        attachments: &[Attachment],
        answer_id: AnswerId,
    ) -> Result<Answer, RelayError> {
        let endpoint = self.resolver.resolve(model, true)?;
        let body = self.payload.build(messages, attachments)?;

        set_sse_headers(consumer);
        let sink = consumer
            .as_flushable()
            .ok_or_else(RelayError::stream_unsupported)?;

        let request = self.build_request(&endpoint, body, self.options.generation_timeout);
        let mut exchange = Exchange::new(model);

        let response = request
            .send()
            .await
            .map_err(|e| exchange.fail(RelayError::transport("Failed to send Gemini API request", e)))?;
        exchange.advance(RelayState::Sent);

        let response = ensure_success(response)
            .await
            .map_err(|e| exchange.fail(e))?;
        exchange.advance(RelayState::Streaming);

        // The response is moved into the stream and dropped on every return below
        match relay_stream(response.bytes_stream(), sink, &answer_id, &self.options).await {
            Ok(answer) => {
                exchange.advance(RelayState::Complete);
                info!(
                    model,
                    answer_id = %answer_id,
                    chars = answer.text.chars().count(),
                    truncated = answer.truncated,
                    "stream complete"
                );
                Ok(answer)
            }
            Err(e) => Err(exchange.fail(e)),
        }
    }
}

/// Turn a non-success status into a `ProviderError` carrying the body
async fn ensure_success(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RelayError::provider_status(status.as_u16(), body))
}

/// Write one partial delivery and push it out immediately
async fn forward(sink: &mut dyn Flushable, answer_id: &AnswerId, text: &str) -> Result<(), RelayError> {
    let event = PartialDelivery::new(answer_id, text).to_event().map_err(|e| {
        RelayError::new(ErrorKind::DecodeFailure, "Failed to encode partial answer")
            .with_debug(e.to_string())
    })?;
    sink.write(&event).await.map_err(RelayError::consumer_write)?;
    sink.flush().await.map_err(RelayError::consumer_write)
}

/// Read newline-terminated lines from `stream`, fold every significant `data: `
/// line into the answer and forward it.
///
/// Ends with the answer on end-of-input, or as truncated as soon as
/// `max_stream_lines` lines have been read, without pulling more input.
/// A trailing line without a newline at end-of-input is discarded.
pub(crate) async fn relay_stream<S, B, E>(
    stream: S,
    sink: &mut dyn Flushable,
    answer_id: &AnswerId,
    options: &RelayOptions,
) -> Result<Answer, RelayError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    pin_mut!(stream);

    let mut answer = Answer::new(String::new()).with_id(answer_id.clone());
    let mut buffer: Vec<u8> = Vec::new();
    let mut lines = 0usize;

    let failed = |err: RelayError, text: &str| {
        if options.keep_partial_on_error {
            err.with_partial(text)
        } else {
            err
        }
    };

    loop {
        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            if lines >= options.max_stream_lines {
                return Ok(cap_reached(answer, answer_id, lines));
            }
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            lines += 1;

            let Some(payload) = data_payload(&line) else {
                continue;
            };
            if payload.is_empty() {
                continue;
            }
            let fragment = parse_fragment(payload);
            if let StreamFragment::Malformed(reason) = &fragment {
                warn!(
                    answer_id = %answer_id,
                    line = lines,
                    "skipping malformed stream fragment: {}",
                    reason
                );
            }
            answer.text = apply_fragment(&fragment, &answer.text);
            if let Err(e) = forward(sink, answer_id, &answer.text).await {
                return Err(failed(e, &answer.text));
            }
        }

        // Never wait on upstream once the cap is used up
        if lines >= options.max_stream_lines {
            return Ok(cap_reached(answer, answer_id, lines));
        }

        match stream.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
            Some(Err(e)) => return Err(failed(RelayError::stream_read(e), &answer.text)),
            None => {
                debug!(answer_id = %answer_id, lines, "stream ended");
                return Ok(answer);
            }
        }
    }
}

fn cap_reached(mut answer: Answer, answer_id: &AnswerId, lines: usize) -> Answer {
    warn!(
        answer_id = %answer_id,
        lines,
        "stream line cap reached, returning partial answer"
    );
    answer.truncated = true;
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BufferedConsumer, ChannelConsumer, ErrorKind, DEFAULT_BASE_URL};
    use async_trait::async_trait;
    use futures_util::stream;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MODEL: &str = "gemini-pro";

    fn chunk(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":{}}}],\"role\":\"model\"}}}}]}}\r\n",
            serde_json::to_string(text).unwrap()
        )
    }

    fn lines(raw: &[String]) -> impl Stream<Item = Result<Vec<u8>, io::Error>> {
        stream::iter(
            raw.iter()
                .map(|l| Ok::<_, io::Error>(l.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    /// Flushable sink recording every flushed event
    #[derive(Default)]
    struct RecordingSink {
        pending: Vec<u8>,
        events: Vec<Vec<u8>>,
        fail_on_write: Option<usize>,
        writes: usize,
    }

    impl RecordingSink {
        fn contents(&self) -> Vec<String> {
            self.events
                .iter()
                .map(|e| PartialDelivery::from_event(e).unwrap().content().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl Flushable for RecordingSink {
        async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.writes += 1;
            if self.fail_on_write == Some(self.writes) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"));
            }
            self.pending.extend_from_slice(bytes);
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            self.events.push(std::mem::take(&mut self.pending));
            Ok(())
        }
    }

    async fn relay(raw: &[String], options: &RelayOptions) -> (Result<Answer, RelayError>, RecordingSink) {
        let mut sink = RecordingSink::default();
        let id = AnswerId::from("answer-1");
        let result = relay_stream(lines(raw), &mut sink, &id, options).await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_stream_accumulates_in_order() {
        let raw = vec![chunk("Hel"), chunk("lo, "), chunk("world")];
        let (result, sink) = relay(&raw, &RelayOptions::default()).await;
        let answer = result.unwrap();

        assert_eq!(answer.text, "Hello, world");
        assert_eq!(answer.id, Some(AnswerId::from("answer-1")));
        assert!(!answer.truncated);
        assert_eq!(sink.contents(), vec!["Hel", "Hello, ", "Hello, world"]);
        assert_eq!(sink.contents().last().unwrap(), &answer.text);
    }

    #[tokio::test]
    async fn test_non_data_lines_do_not_change_result() {
        let plain = vec![chunk("a"), chunk("b")];
        let noisy = vec![
            ": keep-alive\n".to_string(),
            chunk("a"),
            "\r\n".to_string(),
            "event: message\n".to_string(),
            chunk("b"),
            "\n".to_string(),
        ];
        let (plain_result, plain_sink) = relay(&plain, &RelayOptions::default()).await;
        let (noisy_result, noisy_sink) = relay(&noisy, &RelayOptions::default()).await;

        assert_eq!(plain_result.unwrap().text, noisy_result.unwrap().text);
        assert_eq!(plain_sink.contents(), noisy_sink.contents());
    }

    #[tokio::test]
    async fn test_malformed_line_passes_through() {
        let raw = vec![
            chunk("one "),
            "data: {\"candidates\":[{\"content\r\n".to_string(),
            chunk("two"),
        ];
        let (result, sink) = relay(&raw, &RelayOptions::default()).await;

        assert_eq!(result.unwrap().text, "one two");
        assert_eq!(sink.contents(), vec!["one ", "one ", "one two"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let whole = chunk("split");
        let (head, tail) = whole.split_at(17);
        let raw = vec![head.to_string(), tail.to_string()];
        let (result, sink) = relay(&raw, &RelayOptions::default()).await;

        assert_eq!(result.unwrap().text, "split");
        assert_eq!(sink.events.len(), 1);
    }

    #[tokio::test]
    async fn test_unterminated_trailing_line_discarded() {
        let mut last = chunk("b");
        last.truncate(last.len() - 2);
        let raw = vec![chunk("a"), last];
        let (result, _) = relay(&raw, &RelayOptions::default()).await;
        assert_eq!(result.unwrap().text, "a");
    }

    #[tokio::test]
    async fn test_line_cap_on_endless_stream() {
        let options = RelayOptions {
            max_stream_lines: 25,
            ..RelayOptions::default()
        };
        let endless = stream::repeat_with(|| Ok::<_, io::Error>(chunk("x").into_bytes()));
        let mut sink = RecordingSink::default();
        let id = AnswerId::from("answer-1");

        let answer = relay_stream(endless, &mut sink, &id, &options).await.unwrap();

        assert!(answer.truncated);
        assert_eq!(answer.text, "x".repeat(25));
        assert_eq!(sink.events.len(), 25);
    }

    #[tokio::test]
    async fn test_line_cap_stops_without_awaiting_stalled_provider() {
        let options = RelayOptions {
            max_stream_lines: 2,
            ..RelayOptions::default()
        };
        let stalled = lines(&[chunk("a"), chunk("b")]).chain(stream::pending());
        let mut sink = RecordingSink::default();
        let id = AnswerId::from("answer-1");

        let answer = tokio::time::timeout(
            Duration::from_millis(500),
            relay_stream(stalled, &mut sink, &id, &options),
        )
        .await
        .expect("relay waited on upstream past the line cap")
        .unwrap();

        assert!(answer.truncated);
        assert_eq!(answer.text, "ab");
        assert_eq!(sink.contents(), vec!["a", "ab"]);
    }

    #[tokio::test]
    async fn test_line_cap_counts_skipped_lines() {
        let options = RelayOptions {
            max_stream_lines: 3,
            ..RelayOptions::default()
        };
        let raw = vec![
            chunk("a"),
            ": keep-alive\n".to_string(),
            "\r\n".to_string(),
            chunk("never"),
        ];
        let (result, sink) = relay(&raw, &options).await;
        let answer = result.unwrap();

        assert!(answer.truncated);
        assert_eq!(answer.text, "a");
        assert_eq!(sink.events.len(), 1);
    }

    #[tokio::test]
    async fn test_read_error_discards_partial_by_default() {
        let source = stream::iter(vec![
            Ok(chunk("partial").into_bytes()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let mut sink = RecordingSink::default();
        let id = AnswerId::from("answer-1");

        let err = relay_stream(source, &mut sink, &id, &RelayOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::TransportFailure);
        assert_eq!(err.debug.as_deref(), Some("reset by peer"));
        assert!(err.partial.is_none());
        assert_eq!(sink.events.len(), 1);
    }

    #[tokio::test]
    async fn test_read_error_keeps_partial_when_asked() {
        let options = RelayOptions {
            keep_partial_on_error: true,
            ..RelayOptions::default()
        };
        let source = stream::iter(vec![
            Ok(chunk("partial").into_bytes()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let mut sink = RecordingSink::default();
        let id = AnswerId::from("answer-1");

        let err = relay_stream(source, &mut sink, &id, &options).await.unwrap_err();
        assert_eq!(err.partial.as_deref(), Some("partial"));
    }

    #[tokio::test]
    async fn test_consumer_failure_stops_upstream_reads() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = lines(&[chunk("a"), chunk("b"), chunk("c"), chunk("d")]).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut sink = RecordingSink {
            fail_on_write: Some(2),
            ..RecordingSink::default()
        };
        let id = AnswerId::from("answer-1");

        let err = relay_stream(source, &mut sink, &id, &RelayOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ConsumerWriteFailure);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert_eq!(sink.events.len(), 1);
    }

    // --- HTTP exchanges against a stub provider ---

    fn relay_for(base_url: &str, key: Option<&str>) -> GeminiRelay {
        let resolver = EndpointResolver::new(base_url, key.and_then(ApiKey::new));
        GeminiRelay::new(resolver, RelayOptions::default())
    }

    fn conversation() -> Vec<ConversationTurn> {
        vec![ConversationTurn::user("Say hello")]
    }

    #[tokio::test]
    async fn test_single_shot_returns_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-pro:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hello!"}],"role":"model"}}]}"#)
            .create_async()
            .await;

        let relay = relay_for(&server.url(), Some("test-key"));
        let answer = relay
            .run_single_shot(MODEL, &conversation(), &[])
            .await
            .unwrap()
            .with_id(AnswerId::from("caller-id"));

        assert_eq!(answer.text, "Hello!");
        assert_eq!(answer.id, Some(AnswerId::from("caller-id")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_shot_empty_candidates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-pro:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let relay = relay_for(&server.url(), Some("test-key"));
        let err = relay
            .run_single_shot(MODEL, &conversation(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyAnswer);
    }

    #[tokio::test]
    async fn test_single_shot_provider_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-pro:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota exceeded"}}"#)
            .create_async()
            .await;

        let relay = relay_for(&server.url(), Some("test-key"));
        let err = relay
            .run_single_shot(MODEL, &conversation(), &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ProviderError);
        assert_eq!(err.to_string(), "Gemini API error: 429");
        assert!(err.debug.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_single_shot_transport_failure_hides_key() {
        // Nothing listens on the discard port
        let relay = relay_for("http://127.0.0.1:9", Some("super-secret"));
        let err = relay
            .run_single_shot(MODEL, &conversation(), &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::TransportFailure);
        assert!(!format!("{:?}", err).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", mockito::Matcher::Any).expect(0).create_async().await;
        let relay = relay_for(&server.url(), None);

        let err = relay
            .run_single_shot(MODEL, &conversation(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        let (mut consumer, _rx) = ChannelConsumer::new(8);
        let err = relay
            .run_streaming(&mut consumer, MODEL, &conversation(), &[], AnswerId::generate())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(consumer.headers().is_empty());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unflushable_consumer_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", mockito::Matcher::Any).expect(0).create_async().await;
        let relay = relay_for(&server.url(), Some("test-key"));
        let mut consumer = BufferedConsumer::new();

        let err = relay
            .run_streaming(&mut consumer, MODEL, &conversation(), &[], AnswerId::generate())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::StreamUnsupported);
        assert!(consumer.body.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_streaming_over_http() {
        let mut server = mockito::Server::new_async().await;
        let body = format!("{}\r\n{}\r\n{}\r\n", chunk("Hi"), chunk(" there"), chunk("!"));
        let mock = server
            .mock("POST", "/models/gemini-pro:streamGenerateContent")
            .match_query(mockito::Matcher::UrlEncoded("alt".into(), "sse".into()))
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let relay = relay_for(&server.url(), Some("test-key"));
        let (mut consumer, mut rx) = ChannelConsumer::new(16);
        let id = AnswerId::for_request("existing-answer", true);

        let answer = relay
            .run_streaming(&mut consumer, MODEL, &conversation(), &[], id.clone())
            .await
            .unwrap();

        assert_eq!(answer.text, "Hi there!");
        assert_eq!(answer.id, Some(id));
        assert!(consumer
            .headers()
            .contains(&("Content-Type".to_string(), "text/event-stream".to_string())));

        drop(consumer);
        let mut delivered = Vec::new();
        while let Some(event) = rx.recv().await {
            let delivery = PartialDelivery::from_event(&event).unwrap();
            assert_eq!(delivery.id, "existing-answer");
            delivered.push(delivery.content().to_string());
        }
        assert_eq!(delivered, vec!["Hi", "Hi there", "Hi there!"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_streaming_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-pro:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad model"}}"#)
            .create_async()
            .await;

        let relay = relay_for(&server.url(), Some("test-key"));
        let (mut consumer, mut rx) = ChannelConsumer::new(8);
        let err = relay
            .run_streaming(&mut consumer, MODEL, &conversation(), &[], AnswerId::generate())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ProviderError);
        drop(consumer);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_default_options() {
        let options = RelayOptions::default();
        assert_eq!(options.max_stream_lines, 10_000);
        assert_eq!(options.generation_timeout, Duration::from_secs(300));
        assert_eq!(options.label_timeout, Duration::from_secs(60));
        assert!(!DEFAULT_BASE_URL.is_empty());
    }
}
