//! Provider URL selection and credential injection

use super::RelayError;
use reqwest::RequestBuilder;
use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header Gemini accepts the API key on. Keeps the key out of URLs, which end up in logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank keys so an empty env var counts as missing
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// A resolved request target: URL plus the credential to attach
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub stream: bool,
    key: ApiKey,
}

impl Endpoint {
    /// Attach the credential to an outgoing request
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, self.key.expose())
    }
}

/// Selects single-shot vs streaming endpoints for a model
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    base_url: String,
    key: Option<ApiKey>,
}

impl EndpointResolver {
    pub fn new(base_url: impl Into<String>, key: Option<ApiKey>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fail fast when no credential is configured, before building anything
    pub fn ensure_credential(&self) -> Result<&ApiKey, RelayError> {
        self.key
            .as_ref()
            .ok_or_else(|| RelayError::configuration("GEMINI_API_KEY environment variable not set"))
    }

    pub fn resolve(&self, model: &str, stream: bool) -> Result<Endpoint, RelayError> {
        let key = self.ensure_credential()?.clone();
        let url = if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, model)
        };
        Ok(Endpoint { url, stream, key })
    }
}
