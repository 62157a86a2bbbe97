//! WebSocket types and configuration

use super::reconnect::BackoffPolicy;
use std::time::Duration;
use thiserror::Error;

/// Settings for one WebSocket subscription
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Reconnect schedule and attempt limit
    pub backoff: BackoffPolicy,
    /// Keepalive ping period; a ping still unanswered one period later
    /// counts as a lost connection
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            backoff: BackoffPolicy::default(),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Consecutive failed connections tolerated (0 = unlimited)
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.backoff.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.backoff.initial_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.backoff.max_delay = d;
        self
    }

    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }
}

/// Messages delivered by [`super::WsClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// Text frame
    Text(String),
    /// Handshake completed, stream is live
    Connected,
    /// Connection lost, next attempt after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// Client stopped for good
    Disconnected,
}

#[derive(Debug, Clone, Error)]
pub enum WsError {
    /// Dial, read or keepalive failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,
    #[error("Send failed: {0}")]
    SendFailed(String),
}
