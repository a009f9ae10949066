//! Connection state, heartbeat settings and the reconnect backoff policy.

use std::time::Duration;

/// Heartbeat behaviour while connected.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval for sending application-level `ping` events (default: 30s)
    pub ping_interval: Duration,
    /// Time without a `pong` before the connection is considered dead (default: 60s)
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

/// Configuration for reconnection after an established connection is lost.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt (default: 1s)
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts (default: 30s)
    pub max_delay: Duration,
    /// Backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0-1.0, default: 0.0)
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = unlimited)
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 10,
        }
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected and not trying to (initial state, or after `disconnect`)
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Connected and exchanging events
    Connected,
    /// Waiting for the next scheduled attempt
    Reconnecting,
    /// Gave up after max attempts
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnect attempts scheduled since the last successful connect
    pub attempts: u32,
    /// Delay of the currently scheduled attempt, if any
    pub next_retry_in: Option<Duration>,
    pub last_error: Option<String>,
    /// Successful reconnections since start
    pub reconnection_count: u64,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Calculate the backoff delay for a given attempt number.
///
/// `min(initial * multiplier^attempt, max)`, then scaled by a deterministic
/// `1 ± jitter/2` that alternates with the attempt parity.
pub fn calculate_backoff_delay(
    attempt: u32,
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter_factor: f64,
) -> Duration {
    let exponent = attempt.min(64) as i32;
    let base_secs = initial.as_secs_f64() * multiplier.powi(exponent);
    let capped_secs = base_secs.min(max.as_secs_f64());

    let jitter_mult = if attempt % 2 == 0 {
        1.0 + jitter_factor * 0.5
    } else {
        1.0 - jitter_factor * 0.5
    };
    let jittered_secs = capped_secs * jitter_mult;

    Duration::from_secs_f64(jittered_secs.max(0.0))
}

/// Attempt counter plus backoff schedule.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts
    }

    /// Delay until the next attempt, counting it; `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = calculate_backoff_delay(
            self.attempts,
            self.config.initial_delay,
            self.config.max_delay,
            self.config.backoff_multiplier,
            self.config.jitter_factor,
        );
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
