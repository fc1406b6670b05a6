//! tab-bridge - Verified message ports to a companion web app tab.
//!
//! This library lets a browser extension background keep a message channel
//! open to the tab hosting its companion web application.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌──────────────────────┐
//! │  Extension           │      message port      │  Companion page      │
//! │  (Background)        │◄──────────────────────►│  (Tab)               │
//! │                      │   ping {data: name}    │                      │
//! │  TabConnector ──Host │  ───────────────────►  │  echoes data back    │
//! │                      │  ◄───────────────────  │                      │
//! └──────────────────────┘                        └──────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - Browser APIs are reached only through the [`Host`] trait
//! - Every connection attempt uses a fresh random port name as its
//!   correlation token, so stale replies are never mistaken for liveness
//! - Failures are delivered as [`ConnectorEvent::Error`], never returned
//!   from `connect`, `send` or `disconnect`
//! - Connecting does not steal focus from the user's active tab
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use tab_bridge::{ConnectorEvent, MemoryHost, Result, TabConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (connector, mut events) = TabConnector::builder()
//!         .host(MemoryHost::new())
//!         .target("https://app.example.com/")
//!         .build()?;
//!
//!     if connector.connect().await.is_some() {
//!         connector.send(json!({ "action": "getAccounts" }));
//!     }
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ConnectorEvent::Message(payload) => println!("page: {payload}"),
//!             ConnectorEvent::Error(err) => eprintln!("channel: {err}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connector`] | [`TabConnector`], configuration, events |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | [`Host`] / [`Port`] capabilities and [`MemoryHost`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Ping wire format |
//! | [`target`] | Target URL and origin pattern |

// ============================================================================
// Modules
// ============================================================================

/// Tab connection lifecycle.
///
/// Use [`TabConnector::builder()`] to create a connector.
pub mod connector;

/// Error types and result aliases.
pub mod error;

/// Host platform capabilities.
///
/// Implement [`Host`] over the browser's extension APIs, or use
/// [`MemoryHost`] for tests.
pub mod host;

/// Type-safe identifiers for tabs and ports.
pub mod identifiers;

/// Port message types.
pub mod protocol;

/// Target page URL.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

// Connector types
pub use connector::{
    ConnectionState, ConnectorBuilder, ConnectorConfig, ConnectorEvent, ConnectorEvents,
    TabConnector,
};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{
    Host, MemoryHost, Port, PortBehavior, PortChannel, PortEvent, PortEvents, PortRecord, TabInfo,
};

// Identifier types
pub use identifiers::{PortName, TabId};

// Target
pub use target::Target;
