//! In-memory host.
//!
//! [`MemoryHost`] keeps tabs, permissions and ports in process memory and
//! answers pings according to a script of [`PortBehavior`]s, one per opened
//! port. Every port it hands out is recorded as a [`PortRecord`] so callers
//! can inspect what the connector did and when.
//!
//! # Example
//!
//! ```ignore
//! let host = MemoryHost::new();
//! host.add_tab("https://app.example.com/", false);
//! host.script([PortBehavior::Silent, PortBehavior::Echo]);
//!
//! let (connector, mut events) = TabConnector::builder()
//!     .host(host.clone())
//!     .target("https://app.example.com/")
//!     .build()?;
//!
//! connector.connect().await;
//! assert_eq!(host.ports().len(), 2);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{PortName, TabId};
use crate::protocol::Ping;

use super::{Host, Port, PortChannel, PortEvent, PortEventSender, TabInfo};

// ============================================================================
// PortBehavior
// ============================================================================

/// How the page behind a port reacts to the connector.
#[derive(Debug, Clone, PartialEq)]
pub enum PortBehavior {
    /// Answers each ping with its own token.
    Echo,
    /// Never answers.
    Silent,
    /// Disconnects as soon as the port is opened.
    Disconnect,
    /// Answers each ping with a fixed payload.
    Reply(Value),
    /// Answers each ping with the token of the previously opened port.
    EchoPrevious,
}

// ============================================================================
// PortRecord
// ============================================================================

/// What happened to one opened port.
#[derive(Debug, Clone)]
pub struct PortRecord {
    /// Name the port was opened with.
    pub name: PortName,
    /// Tab the port was bound to.
    pub tab_id: TabId,
    /// Behavior the port was scripted with.
    pub behavior: PortBehavior,
    /// When the port was opened.
    pub opened_at: Instant,
    /// When the connector closed the port.
    pub closed_at: Option<Instant>,
    /// When the page side closed the port.
    pub remote_closed_at: Option<Instant>,
    /// Messages posted by the connector, in order.
    pub posted: Vec<Value>,
}

impl PortRecord {
    /// Returns `true` if either side has closed the port.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some() || self.remote_closed_at.is_some()
    }
}

// ============================================================================
// State
// ============================================================================

struct MemoryState {
    granted: bool,
    tabs: Vec<TabInfo>,
    next_tab_id: NonZeroU32,
    create_fails: bool,
    script: VecDeque<PortBehavior>,
    default_behavior: PortBehavior,
    ports: Vec<PortRecord>,
    senders: Vec<Option<PortEventSender>>,
    permission_checks: Vec<String>,
    queries: usize,
    activations: Vec<TabId>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            granted: true,
            tabs: Vec::new(),
            next_tab_id: NonZeroU32::MIN,
            create_fails: false,
            script: VecDeque::new(),
            default_behavior: PortBehavior::Echo,
            ports: Vec::new(),
            senders: Vec::new(),
            permission_checks: Vec::new(),
            queries: 0,
            activations: Vec::new(),
        }
    }
}

impl MemoryState {
    fn set_active(&mut self, tab_id: TabId) {
        for tab in &mut self.tabs {
            tab.active = tab.id == tab_id;
        }
    }

    fn insert_tab(&mut self, url: &str, active: bool) -> TabInfo {
        let id = TabId::from(self.next_tab_id);
        self.next_tab_id = self.next_tab_id.saturating_add(1);

        let tab = TabInfo {
            id,
            url: url.to_string(),
            active,
        };
        self.tabs.push(tab.clone());
        if active {
            self.set_active(id);
        }
        tab
    }

    fn deliver(&mut self, index: usize, event: PortEvent) -> bool {
        match self.senders.get(index).and_then(Option::as_ref) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

// ============================================================================
// MemoryHost
// ============================================================================

/// A [`Host`] backed by process memory.
///
/// Cloning shares the same state, so a test can keep a handle for inspection
/// while the connector owns another.
///
/// Defaults: permission granted, no tabs, every port [`PortBehavior::Echo`].
#[derive(Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryHost")
            .field("granted", &state.granted)
            .field("tabs", &state.tabs.len())
            .field("ports", &state.ports.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MemoryHost - Setup
// ============================================================================

impl MemoryHost {
    /// Creates an empty host.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants or revokes host permission for every origin.
    pub fn set_granted(&self, granted: bool) {
        self.state.lock().granted = granted;
    }

    /// Makes every later `create_tab` call fail.
    pub fn set_create_fails(&self, fails: bool) {
        self.state.lock().create_fails = fails;
    }

    /// Adds a tab showing `url` and returns its ID.
    pub fn add_tab(&self, url: &str, active: bool) -> TabId {
        self.state.lock().insert_tab(url, active).id
    }

    /// Queues behaviors for the next opened ports, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = PortBehavior>) {
        self.state.lock().script.extend(behaviors);
    }

    /// Sets the behavior used once the script runs out.
    pub fn set_default_behavior(&self, behavior: PortBehavior) {
        self.state.lock().default_behavior = behavior;
    }
}

// ============================================================================
// MemoryHost - Inspection
// ============================================================================

impl MemoryHost {
    /// Returns every port opened so far, oldest first.
    #[must_use]
    pub fn ports(&self) -> Vec<PortRecord> {
        self.state.lock().ports.clone()
    }

    /// Returns every tab, in creation order.
    #[must_use]
    pub fn tabs(&self) -> Vec<TabInfo> {
        self.state.lock().tabs.clone()
    }

    /// Returns the currently active tab ID.
    #[must_use]
    pub fn active_tab_id(&self) -> Option<TabId> {
        self.state.lock().tabs.iter().find(|t| t.active).map(|t| t.id)
    }

    /// Returns the tab IDs passed to `activate_tab`, in order.
    #[must_use]
    pub fn activations(&self) -> Vec<TabId> {
        self.state.lock().activations.clone()
    }

    /// Returns the match patterns passed to `has_origin`, in order.
    #[must_use]
    pub fn permission_checks(&self) -> Vec<String> {
        self.state.lock().permission_checks.clone()
    }

    /// Returns how many times `query_tab` was called.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }
}

// ============================================================================
// MemoryHost - Page Side
// ============================================================================

impl MemoryHost {
    /// Posts `message` from the page on the port opened `index`-th.
    ///
    /// Returns `false` if the port is closed or nobody is listening.
    pub fn push_message(&self, index: usize, message: Value) -> bool {
        let mut state = self.state.lock();
        if state.ports.get(index).is_none_or(PortRecord::is_closed) {
            return false;
        }
        state.deliver(index, PortEvent::Message(message))
    }

    /// Closes the port opened `index`-th from the page side.
    ///
    /// Returns `false` if the port was already closed.
    pub fn disconnect_remote(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        match state.ports.get_mut(index) {
            Some(record) if !record.is_closed() => {
                record.remote_closed_at = Some(Instant::now());
            }
            _ => return false,
        }
        state.deliver(index, PortEvent::Disconnected);
        if let Some(slot) = state.senders.get_mut(index) {
            *slot = None;
        }
        true
    }
}

// ============================================================================
// Host Implementation
// ============================================================================

#[async_trait]
impl Host for MemoryHost {
    async fn has_origin(&self, pattern: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.permission_checks.push(pattern.to_string());
        Ok(state.granted)
    }

    async fn query_tab(&self, url: &str) -> Result<Option<TabInfo>> {
        let mut state = self.state.lock();
        state.queries += 1;
        Ok(state.tabs.iter().find(|t| t.url == url).cloned())
    }

    async fn create_tab(&self, url: &str, active: bool) -> Result<TabInfo> {
        let mut state = self.state.lock();
        if state.create_fails {
            return Err(Error::host("tab creation refused"));
        }
        Ok(state.insert_tab(url, active))
    }

    async fn active_tab(&self) -> Result<Option<TabInfo>> {
        Ok(self.state.lock().tabs.iter().find(|t| t.active).cloned())
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.tabs.iter().any(|t| t.id == tab_id) {
            return Err(Error::host(format!("no tab with id {tab_id}")));
        }
        state.activations.push(tab_id);
        state.set_active(tab_id);
        Ok(())
    }

    fn open_port(&self, tab_id: TabId, name: &PortName) -> Result<PortChannel> {
        let mut state = self.state.lock();
        if !state.tabs.iter().any(|t| t.id == tab_id) {
            return Err(Error::host(format!("no tab with id {tab_id}")));
        }

        let behavior = match state.script.pop_front() {
            Some(behavior) => behavior,
            None => state.default_behavior.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let index = state.ports.len();

        state.ports.push(PortRecord {
            name: name.clone(),
            tab_id,
            behavior: behavior.clone(),
            opened_at: Instant::now(),
            closed_at: None,
            remote_closed_at: None,
            posted: Vec::new(),
        });
        state.senders.push(Some(tx));
        trace!(index, port = %name, ?behavior, "Memory port opened");

        if behavior == PortBehavior::Disconnect {
            if let Some(record) = state.ports.get_mut(index) {
                record.remote_closed_at = Some(Instant::now());
            }
            state.deliver(index, PortEvent::Disconnected);
            state.senders[index] = None;
        }

        let port = MemoryPort {
            index,
            name: name.clone(),
            tab_id,
            state: Arc::clone(&self.state),
        };
        Ok(PortChannel::new(Box::new(port), rx))
    }
}

// ============================================================================
// MemoryPort
// ============================================================================

struct MemoryPort {
    index: usize,
    name: PortName,
    tab_id: TabId,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPort {
    fn reply_for(state: &MemoryState, index: usize, ping: &Ping) -> Option<Value> {
        match &state.ports[index].behavior {
            PortBehavior::Echo => Some(json!({ "action": "pong", "data": ping.data })),
            PortBehavior::Reply(value) => Some(value.clone()),
            PortBehavior::EchoPrevious => {
                let stale = index
                    .checked_sub(1)
                    .map(|prev| state.ports[prev].name.to_string())
                    .unwrap_or_default();
                Some(json!({ "action": "pong", "data": stale }))
            }
            PortBehavior::Silent | PortBehavior::Disconnect => None,
        }
    }
}

impl Port for MemoryPort {
    fn name(&self) -> &PortName {
        &self.name
    }

    fn tab_id(&self) -> TabId {
        self.tab_id
    }

    fn post_message(&self, message: Value) -> Result<()> {
        let mut state = self.state.lock();
        let record = &mut state.ports[self.index];
        if record.is_closed() {
            return Err(Error::host(format!("port {} is closed", self.name)));
        }
        record.posted.push(message.clone());

        let reply = Ping::from_value(&message)
            .and_then(|ping| Self::reply_for(&state, self.index, &ping));
        if let Some(reply) = reply {
            state.deliver(self.index, PortEvent::Message(reply));
        }
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        let record = &mut state.ports[self.index];
        if record.closed_at.is_none() {
            record.closed_at = Some(Instant::now());
        }
        state.senders[self.index] = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name(token: &str) -> PortName {
        PortName::new("test:", token)
    }

    #[tokio::test]
    async fn test_query_finds_exact_url() {
        let host = MemoryHost::new();
        let id = host.add_tab("https://app.example.com/", false);

        let found = host.query_tab("https://app.example.com/").await.expect("query");
        assert_eq!(found.map(|t| t.id), Some(id));

        let missing = host.query_tab("https://other.example.com/").await.expect("query");
        assert!(missing.is_none());
        assert_eq!(host.query_count(), 2);
    }

    #[tokio::test]
    async fn test_create_active_tab_takes_focus() {
        let host = MemoryHost::new();
        let first = host.add_tab("https://a.example.com/", true);

        let created = host
            .create_tab("https://b.example.com/", true)
            .await
            .expect("create");

        assert_ne!(created.id, first);
        assert_eq!(host.active_tab_id(), Some(created.id));
    }

    #[tokio::test]
    async fn test_create_fails_when_configured() {
        let host = MemoryHost::new();
        host.set_create_fails(true);
        assert!(host.create_tab("https://a.example.com/", true).await.is_err());
    }

    #[tokio::test]
    async fn test_echo_port_answers_ping() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);

        let mut channel = host.open_port(tab, &name("t1")).expect("open");
        channel
            .port
            .post_message(Ping::new("test:t1").to_value())
            .expect("post");

        let event = channel.events.recv().await;
        assert_eq!(
            event,
            Some(PortEvent::Message(json!({ "action": "pong", "data": "test:t1" })))
        );
    }

    #[tokio::test]
    async fn test_echo_ignores_non_ping_messages() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);

        let mut channel = host.open_port(tab, &name("t1")).expect("open");
        channel.port.post_message(json!({ "action": "sign" })).expect("post");

        assert!(channel.events.try_recv().is_err());
        assert_eq!(host.ports()[0].posted.len(), 1);
    }

    #[tokio::test]
    async fn test_echo_previous_replays_stale_token() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);
        host.script([PortBehavior::Silent, PortBehavior::EchoPrevious]);

        let first = host.open_port(tab, &name("t1")).expect("open");
        first.port.disconnect();

        let mut second = host.open_port(tab, &name("t2")).expect("open");
        second
            .port
            .post_message(Ping::new("test:t2").to_value())
            .expect("post");

        let event = second.events.recv().await;
        assert_eq!(
            event,
            Some(PortEvent::Message(json!({ "action": "pong", "data": "test:t1" })))
        );
    }

    #[tokio::test]
    async fn test_disconnect_behavior_closes_immediately() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);
        host.script([PortBehavior::Disconnect]);

        let mut channel = host.open_port(tab, &name("t1")).expect("open");

        assert_eq!(channel.events.recv().await, Some(PortEvent::Disconnected));
        assert_eq!(channel.events.recv().await, None);
        assert!(channel.port.post_message(json!({})).is_err());
    }

    #[tokio::test]
    async fn test_local_disconnect_records_close() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);

        let channel = host.open_port(tab, &name("t1")).expect("open");
        channel.port.disconnect();

        let record = &host.ports()[0];
        assert!(record.closed_at.is_some());
        assert!(record.remote_closed_at.is_none());
        assert!(!host.push_message(0, json!({ "late": true })));
    }

    #[tokio::test]
    async fn test_remote_disconnect_delivers_event() {
        let host = MemoryHost::new();
        let tab = host.add_tab("https://a.example.com/", false);

        let mut channel = host.open_port(tab, &name("t1")).expect("open");
        assert!(host.disconnect_remote(0));
        assert!(!host.disconnect_remote(0));

        assert_eq!(channel.events.recv().await, Some(PortEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_open_port_unknown_tab() {
        let host = MemoryHost::new();
        let unknown = TabId::new(99).expect("valid tab id");
        assert!(host.open_port(unknown, &name("t1")).is_err());
    }

    #[tokio::test]
    async fn test_activate_unknown_tab_fails() {
        let host = MemoryHost::new();
        let unknown = TabId::new(5).expect("valid tab id");
        assert!(host.activate_tab(unknown).await.is_err());
        assert!(host.activations().is_empty());
    }
}
