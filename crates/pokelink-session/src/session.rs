//! Session types: what the client knows about its own connection.
//!
//! A "session" is the client's record of one authenticated connection:
//! - WHO we are (`username`, server-issued `client_id`)
//! - WHETHER the server has accepted us (`authenticated`)
//!
//! It lives from the connect attempt to the disconnect. The last error is
//! kept on the manager instead, so "connection lost" can still be shown
//! after the session itself is gone.

use std::time::{Duration, Instant};

use pokelink_protocol::PlayerId;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Configuration for the connection manager.
///
/// All values are plain scalars read once at connect time; nothing is
/// reconfigured mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bound on TCP connect + authentication, in milliseconds.
    ///
    /// Default: 5000.
    pub connect_timeout_ms: u64,

    /// Interval between keep-alive messages, in milliseconds.
    ///
    /// Default: 20000.
    pub heartbeat_interval_ms: u64,

    /// How long the writer may spend flushing the final snapshot and
    /// disconnect notice before the socket is dropped, in milliseconds.
    ///
    /// Default: 500.
    pub flush_timeout_ms: u64,

    /// How long the last error stays visible, in seconds.
    ///
    /// Default: 10.
    pub error_ttl_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            heartbeat_interval_ms: 20_000,
            flush_timeout_ms: 500,
            error_ttl_secs: 10,
        }
    }
}

impl ConnectionConfig {
    /// Shortest accepted heartbeat interval.
    pub const MIN_HEARTBEAT_MS: u64 = 100;

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// - `connect_timeout_ms` at least 1.
    /// - `heartbeat_interval_ms` at least [`Self::MIN_HEARTBEAT_MS`].
    pub fn validated(mut self) -> Self {
        if self.connect_timeout_ms == 0 {
            tracing::warn!("connect_timeout_ms is 0, using 1");
            self.connect_timeout_ms = 1;
        }
        if self.heartbeat_interval_ms < Self::MIN_HEARTBEAT_MS {
            tracing::warn!(
                interval_ms = self.heartbeat_interval_ms,
                min_ms = Self::MIN_HEARTBEAT_MS,
                "heartbeat interval too short, clamping"
            );
            self.heartbeat_interval_ms = Self::MIN_HEARTBEAT_MS;
        }
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(self.error_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login credentials sent in the initial `auth` message.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle of the connection.
///
/// ```text
///   Disconnected ──(connect)──→ Connecting ──(auth_success)──→ Connected
///        ↑                          │                              │
///        └──────(refused/timeout)───┘                              │
///        └──────────────(disconnect / socket fault)────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The client's view of one connection attempt and its result.
#[derive(Debug, Clone)]
pub struct Session {
    /// The name we logged in with.
    pub username: String,

    /// Set once the server accepted our credentials.
    pub authenticated: bool,

    /// Identifier the server assigned us. `None` until authenticated.
    pub client_id: Option<PlayerId>,
}

impl Session {
    pub(crate) fn new(username: String) -> Self {
        Self {
            username,
            authenticated: false,
            client_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LastError
// ---------------------------------------------------------------------------

/// The most recent user-visible error, with the instant it was recorded.
#[derive(Debug, Clone)]
pub struct LastError {
    pub message: String,
    pub at: Instant,
}

impl LastError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Instant::now(),
        }
    }

    /// Whether this error is older than `ttl` as of `now`.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.at) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_matches_documented_values() {
        let cfg = ConnectionConfig::default();
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_config_validated_clamps_heartbeat() {
        let cfg = ConnectionConfig {
            heartbeat_interval_ms: 1,
            connect_timeout_ms: 0,
            ..ConnectionConfig::default()
        }
        .validated();
        assert_eq!(cfg.heartbeat_interval_ms, ConnectionConfig::MIN_HEARTBEAT_MS);
        assert_eq!(cfg.connect_timeout_ms, 1);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{ "heartbeat_interval_ms": 1500 }"#).unwrap();
        assert_eq!(cfg.heartbeat_interval_ms, 1500);
        assert_eq!(cfg.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_last_error_expires_after_ttl() {
        let err = LastError::new("connection lost");
        let ttl = Duration::from_secs(10);
        assert!(!err.is_expired(ttl, err.at + Duration::from_secs(9)));
        assert!(err.is_expired(ttl, err.at + Duration::from_secs(11)));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("Ash", "pikachu123");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("Ash"));
        assert!(!dbg.contains("pikachu123"));
    }
}
