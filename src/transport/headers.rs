//! Caller-supplied header pass-through

use std::sync::Arc;

use async_trait::async_trait;

use super::error::TransportResult;
use super::{Transport, TransportRequest};

/// Transport wrapper adding fixed headers (e.g. `Authorization`) to every request
///
/// Headers already present on a request are left alone. Values are passed
/// through unmodified.
#[derive(Clone)]
pub struct HeaderTransport {
    inner: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
}

impl HeaderTransport {
    pub fn new(inner: Arc<dyn Transport>, headers: Vec<(String, String)>) -> Self {
        Self { inner, headers }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

#[async_trait]
impl Transport for HeaderTransport {
    async fn request(&self, request: &TransportRequest) -> TransportResult<serde_json::Value> {
        let missing: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| !request.has_header(name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return self.inner.request(request).await;
        }
        let request = request.clone().with_headers(missing);
        self.inner.request(&request).await
    }
}
