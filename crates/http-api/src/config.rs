use std::fmt::Debug;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Builder for [`HttpApiConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpApiConfigBuilder {
    token: String,
    base_url: Option<String>,
    request_timeout: Option<Duration>,
}

impl HttpApiConfigBuilder {
    /// Creates a builder with the given bearer token.
    #[inline]
    pub fn with_token<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
            base_url: None,
            request_timeout: None,
        }
    }

    /// Sets a custom base URL, e.g. `https://journal.example.com/api`.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Limits how long a single HTTP request may take.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> HttpApiConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        HttpApiConfig {
            token: self.token,
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout: self.request_timeout,
        }
    }
}

impl Debug for HttpApiConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfigBuilder")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Configuration for [`crate::HttpConversationApi`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpApiConfig {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) request_timeout: Option<Duration>,
}

impl HttpApiConfig {
    #[inline]
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
