use std::fmt;
use std::time::Duration;

use pacman_frame::FrameConfig;

/// Default identity announced by the emulator role.
pub const DEFAULT_IDENTITY: &[u8] = b"pacman";

/// Which side of the bootstrap exchange a link plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Data consumer: reads the two bootstrap frames, then streams.
    Reader,
    /// Card emulator: writes an identity frame and an empty frame.
    Emulator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => f.write_str("reader"),
            Role::Emulator => f.write_str("emulator"),
        }
    }
}

/// Fixed-interval reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_interval: Duration,
    /// Total connect attempts, including the first. Zero is treated as one.
    pub max_connect_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(500),
            max_connect_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no retry.
    pub fn none() -> Self {
        Self {
            retry_interval: Duration::ZERO,
            max_connect_attempts: 1,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_connect_attempts.max(1)
    }
}

/// Configuration for connecting, bootstrapping and streaming.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Framing limits and socket timeouts used once streaming.
    pub frame: FrameConfig,
    /// Deadline for the whole bootstrap exchange.
    pub handshake_timeout: Duration,
    /// Largest bootstrap frame body accepted by the reader role.
    pub max_bootstrap_size: usize,
    /// Identity frame body sent by the emulator role.
    pub identity: Vec<u8>,
    pub retry: RetryPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            handshake_timeout: Duration::from_secs(5),
            max_bootstrap_size: 16 * 1024,
            identity: DEFAULT_IDENTITY.to_vec(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LinkConfig {
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_max_bootstrap_size(mut self, size: usize) -> Self {
        self.max_bootstrap_size = size;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<Vec<u8>>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.identity, b"pacman");
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_connect_attempts, 10);
        assert!(config.frame.read_timeout.is_none());
    }

    #[test]
    fn builders_override() {
        let config = LinkConfig::default()
            .with_identity(*b"card-7")
            .with_max_bootstrap_size(64)
            .with_retry(RetryPolicy::none());
        assert_eq!(config.identity, b"card-7");
        assert_eq!(config.max_bootstrap_size, 64);
        assert_eq!(config.retry.attempts(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let retry = RetryPolicy::default().with_max_connect_attempts(0);
        assert_eq!(retry.attempts(), 1);
    }
}
