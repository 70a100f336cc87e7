//! In-memory transport with scripted responses
//!
//! Useful for exercising adapters, metadata sets and the connector without
//! a network. Responses are either routed by URL fragment (persistent) or
//! queued (consumed first-in, first-out). Every request is recorded when it
//! starts and counted again when it completes, so a request dropped
//! mid-flight shows up as started but never completed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::{TransportError, TransportResult};
use super::{Transport, TransportRequest};

type Scripted = TransportResult<serde_json::Value>;

/// Transport returning canned responses
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, Scripted)>>,
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
    completed: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    /// Create an empty scripted transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to simulate slow sources
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer every request whose full URL contains `fragment`
    pub fn route(self, fragment: impl Into<String>, response: Scripted) -> Self {
        lock(&self.routes).push((fragment.into(), response));
        self
    }

    /// Queue a response for the next unrouted request
    pub fn push(&self, response: Scripted) {
        lock(&self.queue).push_back(response);
    }

    /// Queue a successful JSON response
    pub fn push_json(&self, body: serde_json::Value) {
        self.push(Ok(body));
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<TransportRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests that ran to completion
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> Scripted {
        if let Some((_, response)) = lock(&self.routes)
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
        {
            return response.clone();
        }
        lock(&self.queue).pop_front().unwrap_or_else(|| {
            Err(TransportError::network(format!(
                "no scripted response for {url}"
            )))
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: &TransportRequest) -> TransportResult<serde_json::Value> {
        lock(&self.requests).push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.next_response(&request.full_url())
    }
}

// A poisoned lock only means another test thread panicked mid-push; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
