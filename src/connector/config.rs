//! Connector tuning options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tab_bridge::ConnectorConfig;
//!
//! let config = ConnectorConfig::new()
//!     .with_max_attempts(5)
//!     .with_handshake_timeout(Duration::from_millis(250));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of handshake attempts per `connect()` call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default time to wait for a pong before abandoning an attempt.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default pause after a port disconnects during the handshake.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Default namespace tag prepended to port names.
pub const DEFAULT_PORT_NAME_PREFIX: &str = "tab-bridge:";

/// Default entropy of a correlation token, in bytes.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Smallest accepted token size. Shorter tokens become guessable.
const MIN_TOKEN_BYTES: usize = 16;

// ============================================================================
// ConnectorConfig
// ============================================================================

/// Handshake and retry settings for a [`TabConnector`](super::TabConnector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Handshake attempts allowed per `connect()` call.
    pub max_attempts: u32,

    /// Time to wait for a pong on each attempt.
    pub handshake_timeout: Duration,

    /// Pause before retrying after the port disconnects mid-handshake.
    ///
    /// A timed-out attempt is retried immediately.
    pub retry_backoff: Duration,

    /// Namespace tag prepended to every port name.
    pub port_name_prefix: String,

    /// Random bytes per correlation token.
    pub token_bytes: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            port_name_prefix: DEFAULT_PORT_NAME_PREFIX.to_string(),
            token_bytes: DEFAULT_TOKEN_BYTES,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectorConfig {
    /// Creates a config with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of handshake attempts.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the per-attempt pong timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the pause after a mid-handshake disconnect.
    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the port name namespace tag.
    #[inline]
    #[must_use]
    pub fn with_port_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.port_name_prefix = prefix.into();
        self
    }

    /// Sets the correlation token size in bytes.
    #[inline]
    #[must_use]
    pub fn with_token_bytes(mut self, token_bytes: usize) -> Self {
        self.token_bytes = token_bytes;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectorConfig {
    /// Checks the settings for values the handshake cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_attempts` is 0, the handshake
    /// timeout is zero, or tokens are shorter than 16 bytes.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::config("handshake_timeout must be non-zero"));
        }

        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(Error::config(format!(
                "token_bytes must be at least {MIN_TOKEN_BYTES}, got {}",
                self.token_bytes
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
