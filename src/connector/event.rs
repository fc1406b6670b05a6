//! Events delivered to the connector's owner.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Error;

// ============================================================================
// Types
// ============================================================================

/// Receiver for [`ConnectorEvent`]s, returned when the connector is built.
pub type ConnectorEvents = mpsc::UnboundedReceiver<ConnectorEvent>;

// ============================================================================
// ConnectorEvent
// ============================================================================

/// Notification from a [`TabConnector`](super::TabConnector).
#[derive(Debug)]
pub enum ConnectorEvent {
    /// A message posted by the page after the handshake, unchanged.
    Message(Value),
    /// A connection failure or a local close.
    Error(Error),
}

impl ConnectorEvent {
    /// Returns the message payload, if this is a message.
    #[inline]
    #[must_use]
    pub fn as_message(&self) -> Option<&Value> {
        match self {
            Self::Message(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// Returns the error, if this is an error.
    #[inline]
    #[must_use]
    pub fn as_error(&self) -> Option<&Error> {
        match self {
            Self::Error(err) => Some(err),
            Self::Message(_) => None,
        }
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection state, derived from the tracked tab and port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No tab and no port.
    Disconnected,
    /// A tab is tracked but no verified port exists yet.
    TabAcquired,
    /// A verified port is live. Only state that accepts `send`.
    Connected,
}

impl ConnectionState {
    /// Derives the state from what the connector holds.
    ///
    /// A port without a tab cannot occur and reports as `Connected`.
    #[inline]
    #[must_use]
    pub(crate) fn derive(has_tab: bool, has_port: bool) -> Self {
        match (has_tab, has_port) {
            (_, true) => Self::Connected,
            (true, false) => Self::TabAcquired,
            (false, false) => Self::Disconnected,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
