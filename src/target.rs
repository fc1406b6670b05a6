//! Target page the connector binds to.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Target
// ============================================================================

/// URL of the companion page a connector talks to.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Parses a target URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `url` does not parse or cannot
    /// host a page (e.g. `data:` or `mailto:` URLs).
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::invalid_argument(format!("Invalid target URL '{url}': {e}")))?;
        Self::try_from(url)
    }

    /// Returns the parsed URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the URL as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the host-permission match pattern for the target's origin.
    ///
    /// Match patterns do not carry ports, so `http://localhost:8080/app`
    /// yields `http://localhost/*`.
    #[must_use]
    pub fn origin_pattern(&self) -> String {
        let scheme = self.url.scheme();
        match self.url.host_str() {
            Some(host) => format!("{scheme}://{host}/*"),
            None => format!("{scheme}:///*"),
        }
    }
}

impl TryFrom<Url> for Target {
    type Error = Error;

    fn try_from(url: Url) -> Result<Self> {
        if url.cannot_be_a_base() {
            return Err(Error::invalid_argument(format!(
                "Target URL '{url}' cannot be shown in a tab"
            )));
        }
        Ok(Self { url })
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let target = Target::parse("https://app.example.com/wallet").expect("valid url");
        assert_eq!(target.as_str(), "https://app.example.com/wallet");
    }

    #[test]
    fn test_parse_invalid() {
        let err = Target::parse("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_rejects_cannot_be_a_base() {
        assert!(Target::parse("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_origin_pattern() {
        let target = Target::parse("https://app.example.com/wallet?x=1").expect("valid url");
        assert_eq!(target.origin_pattern(), "https://app.example.com/*");
    }

    #[test]
    fn test_origin_pattern_drops_port() {
        let target = Target::parse("http://localhost:8080/").expect("valid url");
        assert_eq!(target.origin_pattern(), "http://localhost/*");
    }

    #[test]
    fn test_origin_pattern_file() {
        let target = Target::parse("file:///tmp/app.html").expect("valid url");
        assert_eq!(target.origin_pattern(), "file:///*");
    }
}
