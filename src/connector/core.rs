//! Core TabConnector implementation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::host::{Host, Port, PortChannel, PortEvent, PortEvents, TabInfo};
use crate::identifiers::{PortName, TabId};
use crate::target::Target;

use super::builder::ConnectorBuilder;
use super::config::ConnectorConfig;
use super::event::{ConnectionState, ConnectorEvent, ConnectorEvents};
use super::handshake::{HandshakeOutcome, handshake};

// ============================================================================
// Types
// ============================================================================

/// A verified port and the task relaying its events.
struct LivePort {
    port: Box<dyn Port>,
    relay: JoinHandle<()>,
}

impl LivePort {
    /// Stops relaying and closes the port. Emits nothing.
    fn close(self) {
        self.relay.abort();
        self.port.disconnect();
    }
}

/// Mutable connection state. Never held across `.await`.
#[derive(Default)]
struct ConnectorState {
    tab_id: Option<TabId>,
    live: Option<LivePort>,
}

/// State shared between the connector and its relay task.
struct Shared {
    host: Arc<dyn Host>,
    target: Target,
    config: ConnectorConfig,
    events_tx: mpsc::UnboundedSender<ConnectorEvent>,
    state: Mutex<ConnectorState>,
}

impl Shared {
    fn emit(&self, event: ConnectorEvent) {
        if self.events_tx.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }

    fn emit_error(&self, err: Error) {
        debug!(target_url = %self.target, error = %err, "Connector error");
        self.emit(ConnectorEvent::Error(err));
    }
}

// ============================================================================
// TabConnector
// ============================================================================

/// Maintains a verified message port to the tab showing a target page.
///
/// Results of `connect`, `send` and `disconnect` are reported through the
/// [`ConnectorEvents`] receiver returned at construction; none of them fail
/// synchronously.
///
/// # Example
///
/// ```ignore
/// let (connector, mut events) = TabConnector::builder()
///     .host(host)
///     .target("https://app.example.com/")
///     .build()?;
///
/// if connector.connect().await.is_some() {
///     connector.send(json!({ "action": "getAccounts" }));
/// }
///
/// while let Some(event) = events.recv().await {
///     match event {
///         ConnectorEvent::Message(payload) => handle(payload),
///         ConnectorEvent::Error(err) => warn!(%err, "tab channel error"),
///     }
/// }
/// ```
pub struct TabConnector {
    shared: Arc<Shared>,
    /// Serializes `connect()` so only one handshake runs at a time.
    connect_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for TabConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabConnector")
            .field("target", &self.shared.target)
            .field("state", &self.state())
            .field("tab_id", &self.tab_id())
            .finish_non_exhaustive()
    }
}

impl TabConnector {
    /// Creates a new connector builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    /// Creates a connector from validated parts.
    pub(crate) fn new(
        host: Arc<dyn Host>,
        target: Target,
        config: ConnectorConfig,
    ) -> (Self, ConnectorEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let connector = Self {
            shared: Arc::new(Shared {
                host,
                target,
                config,
                events_tx,
                state: Mutex::new(ConnectorState::default()),
            }),
            connect_lock: tokio::sync::Mutex::new(()),
        };

        (connector, events_rx)
    }
}

// ============================================================================
// TabConnector - Accessors
// ============================================================================

impl TabConnector {
    /// Returns the target page.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.shared.target
    }

    /// Returns the handshake settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.shared.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        let state = self.shared.state.lock();
        ConnectionState::derive(state.tab_id.is_some(), state.live.is_some())
    }

    /// Returns `true` if a verified port is live.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the tracked tab, if any.
    #[must_use]
    pub fn tab_id(&self) -> Option<TabId> {
        self.shared.state.lock().tab_id
    }

    /// Returns the name of the live port, if any.
    #[must_use]
    pub fn port_name(&self) -> Option<PortName> {
        self.shared
            .state
            .lock()
            .live
            .as_ref()
            .map(|live| live.port.name().clone())
    }
}

// ============================================================================
// TabConnector - Lifecycle
// ============================================================================

impl TabConnector {
    /// Connects to the target tab, finding or creating it as needed.
    ///
    /// Returns the connected tab, or `None` after emitting the reason as
    /// [`ConnectorEvent::Error`]. Returns the current tab at once if already
    /// connected. The previously active tab is re-activated afterwards so
    /// connecting does not steal focus.
    pub async fn connect(&self) -> Option<TabId> {
        let _guard = self.connect_lock.lock().await;
        let shared = &self.shared;

        {
            let state = shared.state.lock();
            if state.live.is_some() {
                return state.tab_id;
            }
        }

        if !self.check_permission().await {
            shared.emit_error(Error::permission_denied(shared.target.as_str()));
            return None;
        }

        let previous = match shared.host.active_tab().await {
            Ok(tab) => tab.map(|t| t.id),
            Err(e) => {
                warn!(error = %e, "Failed to read active tab");
                None
            }
        };

        let tab = match self.acquire_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                shared.emit_error(e);
                return None;
            }
        };
        shared.state.lock().tab_id = Some(tab.id);
        debug!(tab_id = %tab.id, target_url = %shared.target, "Tab acquired");

        match handshake(shared.host.as_ref(), tab.id, &shared.config).await {
            HandshakeOutcome::Connected(channel) => {
                self.install(tab.id, channel);
                info!(tab_id = %tab.id, target_url = %shared.target, "Connected");
                self.restore_focus(previous, tab.id).await;
                Some(tab.id)
            }

            HandshakeOutcome::Exhausted { attempts } => {
                self.forget_tab(tab.id);
                self.restore_focus(previous, tab.id).await;
                warn!(tab_id = %tab.id, attempts, "Handshake attempts exhausted");
                shared.emit_error(Error::handshake_exhausted(shared.target.as_str(), attempts));
                None
            }

            HandshakeOutcome::Repudiated => {
                self.forget_tab(tab.id);
                self.restore_focus(previous, tab.id).await;
                warn!(tab_id = %tab.id, "Handshake repudiated");
                shared.emit_error(Error::handshake_repudiated(shared.target.as_str()));
                None
            }
        }
    }

    /// Drops the tracked tab and closes the live port, if any.
    ///
    /// Closing a live port emits [`Error::ClosedLocally`]. Without a live
    /// port this emits nothing, so repeated calls are harmless.
    pub fn disconnect(&self) {
        let live = {
            let mut state = self.shared.state.lock();
            state.tab_id = None;
            state.live.take()
        };

        if let Some(live) = live {
            let tab_id = live.port.tab_id();
            live.close();
            info!(%tab_id, "Disconnected");
            self.shared.emit_error(Error::ClosedLocally { tab_id });
        }
    }

    /// Posts `message` to the page unchanged.
    ///
    /// Emits [`Error::NotConnected`] instead if no verified port is live. If
    /// the page closed the port before its disconnect was relayed, the port
    /// is torn down and [`Error::RemoteDisconnected`] is emitted.
    pub fn send(&self, message: Value) {
        let dead = {
            let mut state = self.shared.state.lock();
            let Some(live) = state.live.as_ref() else {
                drop(state);
                self.shared.emit_error(Error::NotConnected);
                return;
            };

            match live.port.post_message(message) {
                Ok(()) => return,
                Err(e) => {
                    debug!(error = %e, "Post failed on live port");
                    state.tab_id = None;
                    state.live.take()
                }
            }
        };

        if let Some(live) = dead {
            let tab_id = live.port.tab_id();
            live.close();
            info!(%tab_id, "Port lost while sending");
            self.shared.emit_error(Error::RemoteDisconnected { tab_id });
        }
    }

    /// Serializes `message` and posts it like [`send`](Self::send).
    ///
    /// Serialization failures are emitted as [`Error::Json`].
    pub fn send_json<T: Serialize>(&self, message: &T) {
        match serde_json::to_value(message) {
            Ok(value) => self.send(value),
            Err(e) => self.shared.emit_error(Error::Json(e)),
        }
    }
}

// ============================================================================
// TabConnector - Internal
// ============================================================================

impl TabConnector {
    /// Asks the host whether the target's origin is granted.
    async fn check_permission(&self) -> bool {
        let pattern = self.shared.target.origin_pattern();
        match self.shared.host.has_origin(&pattern).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(%pattern, error = %e, "Permission check failed");
                false
            }
        }
    }

    /// Finds a tab showing the target, or opens one in the foreground.
    async fn acquire_tab(&self) -> Result<TabInfo> {
        let host = &self.shared.host;
        let url = self.shared.target.as_str();

        let existing = host
            .query_tab(url)
            .await
            .map_err(|e| Error::tab_unavailable(url, e.to_string()))?;

        if let Some(tab) = existing {
            return Ok(tab);
        }

        debug!(target_url = %url, "No tab for target, creating one");
        host.create_tab(url, true)
            .await
            .map_err(|e| Error::tab_unavailable(url, e.to_string()))
    }

    /// Stores a verified port and starts relaying its events.
    fn install(&self, tab_id: TabId, channel: PortChannel) {
        let PortChannel { port, events } = channel;
        let name = port.name().clone();

        // Spawned under the lock so the relay cannot observe the state
        // before its port is stored.
        let mut state = self.shared.state.lock();
        let relay = tokio::spawn(relay(Arc::clone(&self.shared), name, events));
        state.tab_id = Some(tab_id);
        state.live = Some(LivePort { port, relay });
    }

    /// Clears the tab handle after a failed handshake.
    fn forget_tab(&self, tab_id: TabId) {
        let mut state = self.shared.state.lock();
        if state.live.is_none() && state.tab_id == Some(tab_id) {
            state.tab_id = None;
        }
    }

    /// Re-activates `previous` if connecting moved focus away from it.
    async fn restore_focus(&self, previous: Option<TabId>, acquired: TabId) {
        let Some(previous) = previous else {
            return;
        };
        if previous == acquired {
            return;
        }

        trace!(%previous, %acquired, "Restoring focus");
        if let Err(e) = self.shared.host.activate_tab(previous).await {
            warn!(tab_id = %previous, error = %e, "Failed to restore focus");
        }
    }
}

impl Drop for TabConnector {
    fn drop(&mut self) {
        let live = self.shared.state.lock().live.take();
        if let Some(live) = live {
            live.close();
        }
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Forwards page messages to the owner until the port goes away.
async fn relay(shared: Arc<Shared>, name: PortName, mut events: PortEvents) {
    while let Some(event) = events.recv().await {
        match event {
            PortEvent::Message(payload) => shared.emit(ConnectorEvent::Message(payload)),
            PortEvent::Disconnected => break,
        }
    }

    let lost = {
        let mut state = shared.state.lock();
        let current = state
            .live
            .as_ref()
            .is_some_and(|live| live.port.name() == &name);

        if current {
            state.live = None;
            state.tab_id.take()
        } else {
            None
        }
    };

    match lost {
        Some(tab_id) => {
            info!(%tab_id, port = %name, "Port disconnected by page");
            shared.emit_error(Error::RemoteDisconnected { tab_id });
        }
        None => trace!(port = %name, "Relay for superseded port stopped"),
    }
}

// ============================================================================
// Tests
// ============================================================================
