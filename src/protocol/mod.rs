//! Port message types.
//!
//! The connector only defines the liveness handshake. Everything posted
//! after the handshake is application traffic and passes through as raw
//! [`serde_json::Value`].
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`Ping`] | Connector → Page | Liveness probe carrying a correlation token |
//! | Pong | Page → Connector | Any message whose `data` equals the token |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `ping` | Ping request and pong matching |

// ============================================================================
// Submodules
// ============================================================================

/// Ping request and pong matching.
pub mod ping;

// ============================================================================
// Re-exports
// ============================================================================

pub use ping::{PING_ACTION, Ping, pong_token};
