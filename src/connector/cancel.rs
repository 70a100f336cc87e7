//! Cooperative cancellation
//!
//! A [`CancellationToken`] is raced against an operation with
//! `tokio::select!`. When the token wins, the operation's future is
//! dropped, which aborts any in-flight transport request.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::ConnectorError;
use crate::models::Page;

/// Cloneable cancellation flag; all clones observe the same state
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal cancellation; idempotent
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once the token is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `operation` unless the token is cancelled first
    pub async fn run<F, T, E>(&self, operation: F, canceled: E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if self.is_cancelled() {
            return Err(canceled);
        }
        tokio::select! {
            biased;

            _ = self.cancelled() => Err(canceled),
            result = operation => result,
        }
    }
}

/// A search running on its own task
///
/// Calling [`SearchHandle::cancel`] drops the in-flight request; the task
/// then finishes with [`ConnectorError::Canceled`].
#[derive(Debug)]
pub struct SearchHandle {
    token: CancellationToken,
    task: JoinHandle<Result<Page, ConnectorError>>,
}

impl SearchHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<Result<Page, ConnectorError>>) -> Self {
        Self { token, task }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the search to finish
    pub async fn join(self) -> Result<Page, ConnectorError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ConnectorError::Canceled),
        }
    }
}
