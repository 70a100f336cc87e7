//! reqwest-based HTTP transport
//!
//! Sends every request with `Accept: application/json` (unless the caller
//! supplies its own), applies the configured timeout, and retries transient
//! failures of GET requests with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use metadata_connector::transport::{HttpTransport, Transport, TransportConfig, TransportRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(TransportConfig::default().with_timeout(10))?;
//! let request = TransportRequest::get("https://api.openconceptlab.org/orgs/PEPFAR/sources/MER/concepts/")
//!     .with_param("limit", "10");
//! let body = transport.request(&request).await?;
//! println!("{}", body);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use super::config::TransportConfig;
use super::error::{TransportError, TransportResult};
use super::retry::RetryPolicy;
use super::{HttpMethod, JSON_CONTENT_TYPE, Transport, TransportRequest};

/// HTTP transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
    retry: RetryPolicy,
    default_headers: Vec<(String, String)>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if let Some(ref agent) = config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(&config),
            config,
            default_headers: Vec::new(),
        })
    }

    /// Add a header sent with every request (e.g. an auth token from the session layer)
    ///
    /// Headers set on an individual request take precedence.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Perform a single attempt, without retries
    async fn send_once(&self, request: &TransportRequest) -> TransportResult<serde_json::Value> {
        let url = request.full_url();
        let mut builder = self.client.request(to_reqwest_method(request.method), &url);

        for (name, value) in &self.default_headers {
            if !request.has_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.has_header(ACCEPT.as_str()) {
            builder = builder.header(ACCEPT, JSON_CONTENT_TYPE);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, %url, "Sending request");

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(%url, status = status.as_u16(), "Source returned error status");
            return Err(TransportError::http(status.as_u16(), body));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            TransportError::Decode(format!("Response from {url} is not valid JSON: {e}"))
        })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::timeout(self.config.timeout_seconds)
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::network(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &TransportRequest) -> TransportResult<serde_json::Value> {
        let url = request.full_url();
        self.retry
            .run(request.method, &url, || self.send_once(request))
            .await
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
