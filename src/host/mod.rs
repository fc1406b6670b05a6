//! Host platform capabilities.
//!
//! The connector never calls browser APIs directly. Everything it needs from
//! the extension host is expressed by the [`Host`] and [`Port`] traits, so a
//! real `chrome.*`/`browser.*` binding and the in-memory [`MemoryHost`] are
//! interchangeable.
//!
//! # Capabilities
//!
//! | Capability | Method |
//! |------------|--------|
//! | Permission check | [`Host::has_origin`] |
//! | Tab acquisition | [`Host::query_tab`], [`Host::create_tab`] |
//! | Focus preservation | [`Host::active_tab`], [`Host::activate_tab`] |
//! | Messaging | [`Host::open_port`], [`Port`] |
//! | Correlation tokens | [`Host::random_token`] |
//!
//! # Port Events
//!
//! Opening a port yields a [`PortChannel`]: the [`Port`] used to post and
//! close, plus an event receiver standing in for the `onMessage` and
//! `onDisconnect` listeners. Dropping the receiver removes the listeners.

// ============================================================================
// Submodules
// ============================================================================

/// In-memory host for tests and benchmarks.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::{PortName, TabId, random_token};

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryHost, PortBehavior, PortRecord};

// ============================================================================
// Types
// ============================================================================

/// Receiver for events delivered on one port.
pub type PortEvents = mpsc::UnboundedReceiver<PortEvent>;

/// Sender half used by host implementations to deliver port events.
pub type PortEventSender = mpsc::UnboundedSender<PortEvent>;

/// A browser tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    /// Tab ID.
    pub id: TabId,
    /// URL currently shown in the tab.
    pub url: String,
    /// Whether the tab is the active tab of its window.
    pub active: bool,
}

/// Something that happened on a port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    /// The page posted a message.
    Message(Value),
    /// The page side closed the port or the tab went away.
    Disconnected,
}

// ============================================================================
// Port
// ============================================================================

/// Sending half of a message port bound to one tab.
pub trait Port: Send + Sync {
    /// Returns the name the port was opened with.
    fn name(&self) -> &PortName;

    /// Returns the tab the port is bound to.
    fn tab_id(&self) -> TabId;

    /// Posts a message to the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`](crate::Error::Host) if the port is closed.
    fn post_message(&self, message: Value) -> Result<()>;

    /// Closes the port.
    ///
    /// Closing from this side does not deliver [`PortEvent::Disconnected`]
    /// to this side.
    fn disconnect(&self);
}

impl fmt::Debug for dyn Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", self.name())
            .field("tab_id", &self.tab_id())
            .finish()
    }
}

// ============================================================================
// PortChannel
// ============================================================================

/// A freshly opened port and its event stream.
#[derive(Debug)]
pub struct PortChannel {
    /// Posting and closing half.
    pub port: Box<dyn Port>,
    /// Messages and disconnect notifications from the page.
    pub events: PortEvents,
}

impl PortChannel {
    /// Pairs a port with its event receiver.
    #[inline]
    #[must_use]
    pub fn new(port: Box<dyn Port>, events: PortEvents) -> Self {
        Self { port, events }
    }
}

// ============================================================================
// Host
// ============================================================================

/// Extension host APIs consumed by the connector.
#[async_trait]
pub trait Host: Send + Sync {
    /// Returns `true` if host permission is granted for the match pattern.
    async fn has_origin(&self, pattern: &str) -> Result<bool>;

    /// Finds a tab currently showing `url`.
    async fn query_tab(&self, url: &str) -> Result<Option<TabInfo>>;

    /// Opens a new tab showing `url`.
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabInfo>;

    /// Returns the active tab of the focused window, if any.
    async fn active_tab(&self) -> Result<Option<TabInfo>>;

    /// Makes `tab_id` the active tab.
    async fn activate_tab(&self, tab_id: TabId) -> Result<()>;

    /// Opens a message port named `name` to the page in `tab_id`.
    fn open_port(&self, tab_id: TabId, name: &PortName) -> Result<PortChannel>;

    /// Returns `byte_len` cryptographically random bytes, base64-encoded.
    fn random_token(&self, byte_len: usize) -> String {
        random_token(byte_len)
    }
}
