//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for runtime settings.  It is
//! built once at startup from CLI arguments (see `main.rs`) or from defaults,
//! then shared read-only across session tasks.  Keeping it a plain struct —
//! no global state, no environment reads in here — keeps the relay easy to
//! embed in tests and in host applications.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

/// The credential the plugin presents when none was configured on either
/// side.  Matches the historical wire default, so existing plugin front-ends
/// connect out of the box.
pub const DEFAULT_KEY: &str = "DEFAULT_KEY";

/// Default listening port for plugin connections.
pub const DEFAULT_PORT: u16 = 9091;

// ── Session cardinality policy ────────────────────────────────────────────────

/// What happens when a connection arrives while sessions already exist.
///
/// Observed deployments differ on whether a second controller connection
/// should be refused or should replace the first, so the choice is a policy
/// knob rather than a hard-coded behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Single-tenant: a second live connection is refused (closed
    /// immediately) and the existing session is left untouched.
    RefuseExtra,
    /// Single-tenant: a new connection tears the existing session down
    /// through the normal close path, then takes its place.
    PreemptExisting,
    /// Multi-tenant: every authenticated connection is admitted under a
    /// fresh session identifier.
    Unbounded,
}

impl SessionPolicy {
    /// True for the single-tenant variants (at most one live session).
    pub fn is_single_tenant(self) -> bool {
        !matches!(self, Self::Unbounded)
    }
}

/// Error returned when a policy name on the CLI is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown session policy `{0}` (expected refuse-extra, preempt-existing, or unbounded)")]
pub struct PolicyParseError(String);

impl FromStr for SessionPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refuse-extra" => Ok(Self::RefuseExtra),
            "preempt-existing" => Ok(Self::PreemptExisting),
            "unbounded" => Ok(Self::Unbounded),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}

// ── Relay configuration ───────────────────────────────────────────────────────

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use deck_relay::domain::config::RelayConfig;
///
/// // Defaults match the historical plugin front-end expectations:
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 9091);
/// assert_eq!(cfg.key, "DEFAULT_KEY");
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address and port the WebSocket listener binds to.
    ///
    /// The plugin front-end runs on the same machine, so the default binds
    /// loopback only.
    pub bind_addr: SocketAddr,

    /// Shared secret the plugin must present as the `key` query parameter on
    /// its upgrade request.  Comparison is exact string equality and an empty
    /// presented key is always refused.
    pub key: String,

    /// Connection-cardinality policy.
    pub policy: SessionPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address string.
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}").parse().unwrap(),
            key: DEFAULT_KEY.to_string(),
            policy: SessionPolicy::RefuseExtra,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
