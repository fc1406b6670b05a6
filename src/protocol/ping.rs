//! Ping request and pong matching.
//!
//! # Format
//!
//! Request (connector → page):
//!
//! ```json
//! { "action": "ping", "data": "tab-bridge:3q2+7w==..." }
//! ```
//!
//! Response (page → connector): any message whose `data` field equals the
//! token sent. Other fields are ignored.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Action name carried by ping requests.
pub const PING_ACTION: &str = "ping";

// ============================================================================
// Ping
// ============================================================================

/// Liveness probe posted on a freshly opened port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Always [`PING_ACTION`].
    pub action: String,
    /// Correlation token, echoed back by the page.
    pub data: String,
}

impl Ping {
    /// Creates a ping carrying `token`.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            action: PING_ACTION.to_string(),
            data: token.into(),
        }
    }

    /// Serializes the ping into a port payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "action": self.action,
            "data": self.data,
        })
    }

    /// Parses a payload as a ping, if it is one.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let ping: Self = Self::deserialize(value).ok()?;
        (ping.action == PING_ACTION).then_some(ping)
    }

    /// Returns `true` if `reply` answers this ping.
    #[inline]
    #[must_use]
    pub fn is_answered_by(&self, reply: &Value) -> bool {
        pong_token(reply) == Some(self.data.as_str())
    }
}

/// Extracts the `data` string from a reply, if present.
#[inline]
#[must_use]
pub fn pong_token(reply: &Value) -> Option<&str> {
    reply.get("data").and_then(Value::as_str)
}

// ============================================================================
// Tests
// ============================================================================
