//! Error types for tab-bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Construction and host calls return [`Result<T>`] which uses [`Error`].
//! Connection lifecycle failures are not returned; they are delivered to the
//! owner as [`ConnectorEvent::Error`](crate::ConnectorEvent::Error):
//!
//! ```ignore
//! use tab_bridge::{ConnectorEvent, Error};
//!
//! while let Some(event) = events.recv().await {
//!     if let ConnectorEvent::Error(Error::RemoteDisconnected { .. }) = event {
//!         connector.connect().await;
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Acquisition | [`Error::PermissionDenied`], [`Error::TabUnavailable`] |
//! | Handshake | [`Error::HandshakeExhausted`], [`Error::HandshakeRepudiated`] |
//! | Channel | [`Error::RemoteDisconnected`], [`Error::ClosedLocally`], [`Error::NotConnected`] |
//! | External | [`Error::Host`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::TabId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connector configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument.
    ///
    /// Returned when a caller-supplied value (such as the target URL) is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Acquisition Errors
    // ========================================================================
    /// Host permission for the target origin is not granted.
    #[error("Permission denied for {url}")]
    PermissionDenied {
        /// The target URL that could not be accessed.
        url: String,
    },

    /// No tab showing the target could be found or created.
    #[error("Tab unavailable for {url}: {message}")]
    TabUnavailable {
        /// The target URL.
        url: String,
        /// Description of the host failure.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Every handshake attempt timed out or was disconnected.
    #[error("Failed to connect to {url}")]
    HandshakeExhausted {
        /// The target URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The tab answered the ping with a token from another attempt.
    ///
    /// Displays identically to [`Error::HandshakeExhausted`].
    #[error("Failed to connect to {url}")]
    HandshakeRepudiated {
        /// The target URL.
        url: String,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// The live port was closed by the tab.
    #[error("Port to tab {tab_id} disconnected")]
    RemoteDisconnected {
        /// Tab the port was bound to.
        tab_id: TabId,
    },

    /// The live port was closed by an explicit `disconnect()`.
    #[error("Port to tab {tab_id} closed locally")]
    ClosedLocally {
        /// Tab the port was bound to.
        tab_id: TabId,
    },

    /// A message was sent with no live port.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Host platform call failed.
    #[error("Host error: {message}")]
    Host {
        /// Description reported by the host.
        message: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a permission denied error.
    #[inline]
    pub fn permission_denied(url: impl Into<String>) -> Self {
        Self::PermissionDenied { url: url.into() }
    }

    /// Creates a tab unavailable error.
    #[inline]
    pub fn tab_unavailable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TabUnavailable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a handshake exhausted error.
    #[inline]
    pub fn handshake_exhausted(url: impl Into<String>, attempts: u32) -> Self {
        Self::HandshakeExhausted {
            url: url.into(),
            attempts,
        }
    }

    /// Creates a handshake repudiated error.
    #[inline]
    pub fn handshake_repudiated(url: impl Into<String>) -> Self {
        Self::HandshakeRepudiated { url: url.into() }
    }

    /// Creates a host error.
    #[inline]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if a `connect()` call gave up during the handshake.
    #[inline]
    #[must_use]
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::HandshakeExhausted { .. } | Self::HandshakeRepudiated { .. }
        )
    }

    /// Returns `true` if this error ends or precludes a live port.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::HandshakeExhausted { .. }
                | Self::HandshakeRepudiated { .. }
                | Self::RemoteDisconnected { .. }
                | Self::ClosedLocally { .. }
                | Self::NotConnected
        )
    }

    /// Returns `true` if calling `connect()` again may succeed.
    ///
    /// Permission and configuration problems need outside action first.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. } | Self::InvalidArgument { .. } | Self::PermissionDenied { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::permission_denied("https://app.example.com/");
        assert_eq!(err.to_string(), "Permission denied for https://app.example.com/");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("max_attempts must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error: max_attempts must be at least 1"
        );
    }

    #[test]
    fn test_handshake_failures_display_alike() {
        let exhausted = Error::handshake_exhausted("https://app.example.com/", 10);
        let repudiated = Error::handshake_repudiated("https://app.example.com/");

        assert_eq!(exhausted.to_string(), repudiated.to_string());
        assert!(exhausted.is_handshake_failure());
        assert!(repudiated.is_handshake_failure());
    }

    #[test]
    fn test_is_connection_error() {
        let tab_id = TabId::new(3).expect("valid tab id");

        assert!(Error::RemoteDisconnected { tab_id }.is_connection_error());
        assert!(Error::ClosedLocally { tab_id }.is_connection_error());
        assert!(Error::NotConnected.is_connection_error());
        assert!(!Error::permission_denied("x").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::handshake_exhausted("x", 10).is_recoverable());
        assert!(Error::tab_unavailable("x", "closed").is_recoverable());
        assert!(!Error::permission_denied("x").is_recoverable());
        assert!(!Error::config("x").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
