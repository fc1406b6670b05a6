//! Builder pattern for connector configuration.
//!
//! # Example
//!
//! ```ignore
//! use tab_bridge::{MemoryHost, TabConnector};
//!
//! let (connector, events) = TabConnector::builder()
//!     .host(MemoryHost::new())
//!     .target("https://app.example.com/")
//!     .max_attempts(5)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::target::Target;

use super::config::ConnectorConfig;
use super::core::TabConnector;
use super::event::ConnectorEvents;

// ============================================================================
// ConnectorBuilder
// ============================================================================

/// Builder for a [`TabConnector`].
///
/// Use [`TabConnector::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectorBuilder {
    /// Host capabilities.
    host: Option<Arc<dyn Host>>,
    /// Unparsed target URL.
    target: Option<String>,
    /// Handshake settings.
    config: ConnectorConfig,
}

impl fmt::Debug for ConnectorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorBuilder")
            .field("host", &self.host.is_some())
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// ConnectorBuilder Implementation
// ============================================================================

impl ConnectorBuilder {
    /// Creates a builder with no host, no target and default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host capabilities.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Sets host capabilities that are shared with other owners.
    #[inline]
    #[must_use]
    pub fn shared_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the URL of the page to connect to.
    #[inline]
    #[must_use]
    pub fn target(mut self, url: impl Into<String>) -> Self {
        self.target = Some(url.into());
        self
    }

    /// Replaces all handshake settings.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of handshake attempts per `connect()`.
    #[inline]
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Sets the per-attempt pong timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the pause after a mid-handshake disconnect.
    #[inline]
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Builds the connector and the owner's event receiver.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if host or target is not set, or settings are invalid
    /// - [`Error::InvalidArgument`] if the target URL does not parse
    pub fn build(self) -> Result<(TabConnector, ConnectorEvents)> {
        let host = self.host.ok_or_else(|| {
            Error::config(
                "Host is required. Use .host() to set it.\n\
                 Example: TabConnector::builder().host(MemoryHost::new())",
            )
        })?;

        let url = self.target.ok_or_else(|| {
            Error::config(
                "Target URL is required. Use .target() to set it.\n\
                 Example: TabConnector::builder().target(\"https://app.example.com/\")",
            )
        })?;

        let target = Target::parse(&url)?;
        self.config.validate()?;

        Ok(TabConnector::new(host, target, self.config))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::host::MemoryHost;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ConnectorBuilder::new();
        assert!(builder.host.is_none());
        assert!(builder.target.is_none());
        assert_eq!(builder.config, ConnectorConfig::default());
    }

    #[test]
    fn test_setters() {
        let builder = ConnectorBuilder::new()
            .target("https://app.example.com/")
            .max_attempts(4)
            .handshake_timeout(Duration::from_millis(50))
            .retry_backoff(Duration::from_millis(10));

        assert_eq!(builder.target.as_deref(), Some("https://app.example.com/"));
        assert_eq!(builder.config.max_attempts, 4);
        assert_eq!(builder.config.handshake_timeout, Duration::from_millis(50));
        assert_eq!(builder.config.retry_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_build_fails_without_host() {
        let err = ConnectorBuilder::new()
            .target("https://app.example.com/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Host"));
    }

    #[test]
    fn test_build_fails_without_target() {
        let err = ConnectorBuilder::new()
            .host(MemoryHost::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Target"));
    }

    #[test]
    fn test_build_fails_with_bad_url() {
        let err = ConnectorBuilder::new()
            .host(MemoryHost::new())
            .target("::not a url::")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_build_fails_with_invalid_config() {
        let result = ConnectorBuilder::new()
            .host(MemoryHost::new())
            .target("https://app.example.com/")
            .max_attempts(0)
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_succeeds() {
        let host: Arc<dyn Host> = Arc::new(MemoryHost::new());
        let (connector, _events) = ConnectorBuilder::new()
            .shared_host(host)
            .target("https://app.example.com/")
            .build()
            .expect("build");

        assert_eq!(connector.target().as_str(), "https://app.example.com/");
    }
}
