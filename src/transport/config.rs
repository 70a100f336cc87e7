//! Configuration types for the HTTP transport

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest accepted request timeout
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Largest accepted retry budget
pub const MAX_RETRIES: u32 = 5;

/// Timeout, retry and identification settings shared by every request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retries for transient failures of idempotent requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles on every retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// User-Agent header sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            user_agent: None,
        }
    }
}

impl TransportConfig {
    /// Set timeout in seconds
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base backoff delay
    pub fn with_backoff_base_ms(mut self, millis: u64) -> Self {
        self.backoff_base_ms = millis;
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Check the timeout and retry budget are within bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(format!(
                "timeout_seconds must be between 1 and {MAX_TIMEOUT_SECONDS}, got {}",
                self.timeout_seconds
            ));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(format!(
                "max_retries must be at most {MAX_RETRIES}, got {}",
                self.max_retries
            ));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
