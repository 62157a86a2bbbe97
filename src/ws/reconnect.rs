//! Reconnect state machine
//!
//! The connection loop in [`super::WsClient`] is driven entirely by
//! [`ReconnectMachine`], which is pure: it never touches the network or the
//! clock, so every transition can be exercised directly in tests.
//!
//! ```text
//! Connecting --Connected--> Subscribed
//! Connecting --Lost-------> Backoff (or Stopped once attempts run out)
//! Subscribed --Lost-------> Backoff
//! Backoff ----Elapsed-----> Connecting
//! any --------Shutdown----> Stopped
//! ```

use std::time::Duration;

/// Exponential backoff bounded by a maximum delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before stopping (0 = unlimited)
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before the `attempt`-th reconnection (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts > 0 && failures >= self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing; `attempt` is 0 for the first connection
    Connecting { attempt: u32 },
    /// Handshake done, messages flowing
    Subscribed,
    /// Waiting before the next dial
    Backoff { attempt: u32, delay: Duration },
    /// Terminal
    Stopped,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed
    Connected,
    /// Dial failed, stream errored, or peer closed
    Lost,
    /// Backoff delay has passed
    BackoffElapsed,
    /// Consumer went away or shutdown requested
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    policy: BackoffPolicy,
    state: ConnectionState,
    failures: u32,
}

impl ReconnectMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Connecting { attempt: 0 },
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the last transition stopped the machine because the policy
    /// ran out of attempts (as opposed to an explicit shutdown)
    pub fn gave_up(&self) -> bool {
        self.state == ConnectionState::Stopped && self.policy.exhausted(self.failures)
    }

    /// Apply an event and return the new state
    pub fn on_event(&mut self, event: ConnectionEvent) -> ConnectionState {
        use ConnectionEvent as E;
        use ConnectionState as S;

        self.state = match (self.state, event) {
            (S::Stopped, _) => S::Stopped,
            (_, E::Shutdown) => S::Stopped,
            (S::Connecting { .. }, E::Connected) => {
                self.failures = 0;
                S::Subscribed
            }
            (S::Connecting { .. } | S::Subscribed, E::Lost) => {
                self.failures += 1;
                if self.policy.exhausted(self.failures) {
                    S::Stopped
                } else {
                    S::Backoff {
                        attempt: self.failures,
                        delay: self.policy.delay_for(self.failures),
                    }
                }
            }
            (S::Backoff { attempt, .. }, E::BackoffElapsed) => S::Connecting { attempt },
            (state, _) => state,
        };

        self.state
    }
}
