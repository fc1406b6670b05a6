//! Ping/pong handshake with retry.
//!
//! A freshly opened port is not trusted until the page echoes the port's own
//! name back. Each attempt ends one of four ways:
//!
//! | Outcome | Budget | Next step |
//! |---------|--------|-----------|
//! | Timeout | -1 | Close port, retry at once |
//! | Disconnect | -1 | Wait `retry_backoff`, retry |
//! | Matching pong | - | Done, port is live |
//! | Other message | - | Close port, give up |
//!
//! Leaving an attempt drops its timer and its event receiver, so nothing from
//! an abandoned attempt can fire later.

// ============================================================================
// Imports
// ============================================================================

use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::host::{Host, PortChannel, PortEvent};
use crate::identifiers::{PortName, TabId};
use crate::protocol::{Ping, pong_token};

use super::config::ConnectorConfig;

// ============================================================================
// RetryBudget
// ============================================================================

/// Remaining handshake attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    #[inline]
    pub(crate) fn new(max_attempts: u32) -> Self {
        Self {
            remaining: max_attempts,
        }
    }

    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    #[inline]
    pub(crate) fn spend(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    #[inline]
    pub(crate) fn remaining(&self) -> u32 {
        self.remaining
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a whole handshake.
#[derive(Debug)]
pub(crate) enum HandshakeOutcome {
    /// The page answered; the port is live.
    Connected(PortChannel),
    /// Every attempt timed out or disconnected.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// The page answered with someone else's token.
    Repudiated,
}

/// Result of a single attempt.
enum Attempt {
    Confirmed,
    TimedOut,
    Disconnected,
    Repudiated,
}

// ============================================================================
// Handshake
// ============================================================================

/// Opens ports to `tab_id` until one is confirmed or the budget runs out.
pub(crate) async fn handshake(
    host: &dyn Host,
    tab_id: TabId,
    config: &ConnectorConfig,
) -> HandshakeOutcome {
    let mut budget = RetryBudget::new(config.max_attempts);
    let mut attempts = 0;

    while !budget.is_exhausted() {
        attempts += 1;

        let token = host.random_token(config.token_bytes);
        let name = PortName::new(&config.port_name_prefix, &token);
        trace!(%tab_id, attempt = attempts, port = %name, "Opening port");

        let PortChannel { port, mut events } = match host.open_port(tab_id, &name) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(%tab_id, attempt = attempts, error = %e, "Failed to open port");
                budget.spend();
                if !budget.is_exhausted() {
                    sleep(config.retry_backoff).await;
                }
                continue;
            }
        };

        let ping = Ping::new(name.as_str());
        let outcome = match port.post_message(ping.to_value()) {
            Err(e) => {
                debug!(%tab_id, attempt = attempts, error = %e, "Ping not delivered");
                port.disconnect();
                Attempt::Disconnected
            }
            Ok(()) => {
                tokio::select! {
                    biased;

                    event = events.recv() => match event {
                        Some(PortEvent::Message(reply)) if ping.is_answered_by(&reply) => {
                            Attempt::Confirmed
                        }
                        Some(PortEvent::Message(reply)) => {
                            warn!(
                                %tab_id,
                                attempt = attempts,
                                got = ?pong_token(&reply),
                                "Pong does not match ping"
                            );
                            Attempt::Repudiated
                        }
                        Some(PortEvent::Disconnected) | None => Attempt::Disconnected,
                    },

                    () = sleep(config.handshake_timeout) => Attempt::TimedOut,
                }
            }
        };

        match outcome {
            Attempt::Confirmed => {
                debug!(%tab_id, attempt = attempts, port = %name, "Handshake completed");
                return HandshakeOutcome::Connected(PortChannel::new(port, events));
            }

            Attempt::Repudiated => {
                port.disconnect();
                return HandshakeOutcome::Repudiated;
            }

            Attempt::TimedOut => {
                drop(events);
                port.disconnect();
                budget.spend();
                debug!(
                    %tab_id,
                    attempt = attempts,
                    remaining = budget.remaining(),
                    "Ping timed out"
                );
            }

            Attempt::Disconnected => {
                drop(events);
                budget.spend();
                debug!(
                    %tab_id,
                    attempt = attempts,
                    remaining = budget.remaining(),
                    "Port disconnected during handshake"
                );
                if !budget.is_exhausted() {
                    sleep(config.retry_backoff).await;
                }
            }
        }
    }

    HandshakeOutcome::Exhausted { attempts }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::host::{MemoryHost, PortBehavior};

    const URL: &str = "https://app.example.com/";

    fn setup(behaviors: impl IntoIterator<Item = PortBehavior>) -> (MemoryHost, TabId) {
        let host = MemoryHost::new();
        let tab = host.add_tab(URL, false);
        host.script(behaviors);
        (host, tab)
    }

    #[test]
    fn test_budget_spend() {
        let mut budget = RetryBudget::new(2);
        assert!(!budget.is_exhausted());
        budget.spend();
        assert_eq!(budget.remaining(), 1);
        budget.spend();
        assert!(budget.is_exhausted());
        budget.spend();
        assert_eq!(budget.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_succeeds() {
        let (host, tab) = setup([PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Connected(_)));
        let ports = host.ports();
        assert_eq!(ports.len(), 1);
        assert!(!ports[0].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_carries_port_name() {
        let (host, tab) = setup([PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        handshake(&host, tab, &config).await;

        let record = &host.ports()[0];
        assert!(record.name.as_str().starts_with("tab-bridge:"));
        assert_eq!(
            record.posted,
            vec![json!({ "action": "ping", "data": record.name.as_str() })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_port_names_are_fresh_per_attempt() {
        let (host, tab) = setup([PortBehavior::Silent, PortBehavior::Silent, PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        handshake(&host, tab, &config).await;

        let ports = host.ports();
        assert_eq!(ports.len(), 3);
        assert_ne!(ports[0].name, ports[1].name);
        assert_ne!(ports[1].name, ports[2].name);
        assert_ne!(ports[0].name, ports[2].name);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let (host, tab) = setup([PortBehavior::Silent]);
        let config = ConnectorConfig::default().with_max_attempts(1);

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Exhausted { attempts: 1 }));
        let ports = host.ports();
        assert_eq!(ports.len(), 1);
        assert!(ports[0].closed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_full_budget() {
        let (host, tab) = setup([]);
        host.set_default_behavior(PortBehavior::Silent);
        let config = ConnectorConfig::default();

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Exhausted { attempts: 10 }));
        let ports = host.ports();
        assert_eq!(ports.len(), 10);
        assert!(ports.iter().all(|p| p.closed_at.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_token_is_repudiation() {
        let (host, tab) = setup([PortBehavior::Silent, PortBehavior::EchoPrevious]);
        let config = ConnectorConfig::default();

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Repudiated));
        let ports = host.ports();
        assert_eq!(ports.len(), 2, "repudiation must not retry");
        assert!(ports[1].closed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbled_reply_is_repudiation() {
        let (host, tab) = setup([PortBehavior::Reply(json!("garbage"))]);
        let config = ConnectorConfig::default();

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Repudiated));
        assert_eq!(host.ports().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retries_without_delay() {
        let (host, tab) = setup([PortBehavior::Silent, PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        handshake(&host, tab, &config).await;

        let ports = host.ports();
        let first_closed = ports[0].closed_at.expect("first port closed");
        assert_eq!(first_closed - ports[0].opened_at, Duration::from_millis(500));
        assert_eq!(ports[1].opened_at, first_closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_retries_after_backoff() {
        let (host, tab) = setup([PortBehavior::Disconnect, PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Connected(_)));
        let ports = host.ports();
        let first_gone = ports[0].remote_closed_at.expect("first port dropped by page");
        assert_eq!(ports[1].opened_at - first_gone, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_undeliverable_ping_closes_port() {
        let (host, tab) = setup([PortBehavior::Disconnect, PortBehavior::Echo]);
        let config = ConnectorConfig::default();

        handshake(&host, tab, &config).await;

        let ports = host.ports();
        assert!(ports[0].remote_closed_at.is_some());
        assert!(ports[0].closed_at.is_some());
        assert!(!ports[1].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_counts_against_budget() {
        let (host, tab) = setup([]);
        host.set_default_behavior(PortBehavior::Disconnect);
        let config = ConnectorConfig::default().with_max_attempts(3);

        let outcome = handshake(&host, tab, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Exhausted { attempts: 3 }));
        assert_eq!(host.ports().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tab_spends_budget() {
        let host = MemoryHost::new();
        let missing = TabId::new(9).expect("valid tab id");
        let config = ConnectorConfig::default().with_max_attempts(2);

        let outcome = handshake(&host, missing, &config).await;

        assert!(matches!(outcome, HandshakeOutcome::Exhausted { attempts: 2 }));
        assert!(host.ports().is_empty());
    }

    fn failure_behavior() -> impl Strategy<Value = PortBehavior> {
        prop_oneof![Just(PortBehavior::Silent), Just(PortBehavior::Disconnect)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_each_failure_costs_one_attempt(
            max_attempts in 1u32..=10,
            failures in prop::collection::vec(failure_behavior(), 0..12),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .expect("runtime");

            let failed = failures.len() as u32;
            let (host, tab) = setup(failures);
            host.set_default_behavior(PortBehavior::Echo);
            let config = ConnectorConfig::default().with_max_attempts(max_attempts);

            let outcome = runtime.block_on(handshake(&host, tab, &config));
            let opened = host.ports().len() as u32;

            if failed < max_attempts {
                let connected = matches!(outcome, HandshakeOutcome::Connected(_));
                prop_assert!(connected);
                prop_assert_eq!(opened, failed + 1);
            } else {
                let exhausted = matches!(
                    outcome,
                    HandshakeOutcome::Exhausted { attempts } if attempts == max_attempts
                );
                prop_assert!(exhausted);
                prop_assert_eq!(opened, max_attempts);
            }
        }
    }
}
