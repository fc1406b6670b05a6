//! Tab connection lifecycle.
//!
//! A [`TabConnector`] turns a target URL into a verified message port:
//!
//! 1. Check host permission for the target's origin
//! 2. Remember the active tab
//! 3. Find a tab showing the target, or open one
//! 4. Handshake: open a port, ping with the port's name, wait for the echo
//! 5. Relay page messages to the owner, put focus back on the remembered tab
//!
//! # State Machine
//!
//! ```text
//!              connect()                 pong matches
//! Disconnected ─────────► TabAcquired ─────────────────► Connected
//!      ▲                      │                              │
//!      │   exhausted /        │       disconnect() /         │
//!      └──── repudiated ◄─────┘       page disconnect ◄──────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent construction with validation |
//! | `config` | Attempt count, timeouts, port naming |
//! | `core` | `TabConnector` and its relay task |
//! | `event` | Owner events and connection state |
//! | `handshake` | Ping/pong with retry |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for connectors.
pub mod builder;

/// Handshake and retry settings.
pub mod config;

/// Core connector implementation.
mod core;

/// Owner-facing events and state.
pub mod event;

/// Ping/pong handshake with retry.
mod handshake;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectorBuilder;
pub use config::ConnectorConfig;
pub use core::TabConnector;
pub use event::{ConnectionState, ConnectorEvent, ConnectorEvents};
