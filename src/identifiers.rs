//! Type-safe identifiers for tabs and ports.
//!
//! Newtype wrappers prevent mixing tab IDs with other integers and port
//! names with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

// ============================================================================
// TabId
// ============================================================================

/// Browser tab identifier.
///
/// Tab IDs assigned by the browser are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(NonZeroU32);

impl TabId {
    /// Creates a tab ID, returning `None` for 0.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the raw ID.
    #[inline]
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0.get()
    }
}

impl From<NonZeroU32> for TabId {
    fn from(id: NonZeroU32) -> Self {
        Self(id)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PortName
// ============================================================================

/// Name of a message port, unique per connection attempt.
///
/// The name is also the correlation token carried by that attempt's ping,
/// so a reply can only confirm the port it was sent on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortName(String);

impl PortName {
    /// Builds a port name from a namespace prefix and a random token.
    #[inline]
    #[must_use]
    pub fn new(prefix: &str, token: &str) -> Self {
        Self(format!("{prefix}{token}"))
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PortName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Random Tokens
// ============================================================================

/// Generates `byte_len` bytes from the OS random source and encodes them as
/// standard base64.
#[must_use]
pub fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

// ============================================================================
// Tests
// ============================================================================
