//! Transport layer
//!
//! Performs JSON requests against external metadata sources. The
//! [`Transport`] trait is the only place network I/O happens; everything
//! above it (adapters, metadata sets, the connector) works with
//! [`TransportRequest`] values and parsed [`serde_json::Value`] bodies.
//!
//! Implementations:
//! - [`HttpTransport`]: reqwest-based client with timeouts and retries (feature `http-transport`)
//! - [`ScriptedTransport`]: in-memory transport returning scripted responses
//! - [`HeaderTransport`]: wrapper passing caller-supplied headers through
//!
//! No caching happens at this layer; each call is a fresh request.

pub mod config;
pub mod error;
pub mod headers;
#[cfg(feature = "http-transport")]
pub mod http;
pub mod retry;
pub mod scripted;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use headers::HeaderTransport;
#[cfg(feature = "http-transport")]
pub use http::HttpTransport;
pub use retry::RetryPolicy;
pub use scripted::ScriptedTransport;

/// Default content type requested from sources
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP method of a transport request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Only GET requests are retried automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully described request, produced by a source adapter
///
/// Query parameters are kept as ordered pairs and only encoded when the
/// final URL is built, so adapters never concatenate raw query strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// URL without query string
    pub url: String,
    /// Ordered query parameters (unencoded)
    #[serde(default)]
    pub query: Vec<(String, String)>,
    /// Extra headers, passed through unmodified
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// JSON body for non-GET requests
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    /// Create a GET request for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append several headers
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// First value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a (possibly repeated) query parameter
    pub fn params(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether a header was supplied (case-insensitive)
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// The URL with the percent-encoded query string appended
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, query)
    }
}

/// Trait for transport implementations
///
/// Implementations apply a timeout to every call, retry transient failures
/// of idempotent requests, and classify failures into [`TransportError`].
/// Dropping the returned future must abort the in-flight request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a request and return the parsed JSON body
    async fn request(&self, request: &TransportRequest) -> TransportResult<serde_json::Value>;
}
