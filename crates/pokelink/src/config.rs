//! Client configuration.
//!
//! One struct per layer, aggregated here so the host game can keep a
//! single JSON file:
//!
//! ```json
//! {
//!   "host": "play.example.net",
//!   "port": 5000,
//!   "connection": { "heartbeat_interval_ms": 20000 },
//!   "battle": { "turn_timeout_secs": 90 }
//! }
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::Path;

use pokelink_battle::BattleConfig;
use pokelink_session::ConnectionConfig;
use pokelink_trade::TradeConfig;
use pokelink_world::WorldConfig;
use serde::Deserialize;

use crate::PokelinkError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default: `127.0.0.1`.
    pub host: String,

    /// Default: 5000.
    pub port: u16,

    pub connection: ConnectionConfig,
    pub world: WorldConfig,
    pub trade: TradeConfig,
    pub battle: BattleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connection: ConnectionConfig::default(),
            world: WorldConfig::default(),
            trade: TradeConfig::default(),
            battle: BattleConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config and clamps it.
    ///
    /// # Errors
    /// Returns [`PokelinkError::Config`] if the JSON doesn't match.
    pub fn from_json(json: &str) -> Result<Self, PokelinkError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    /// [`PokelinkError::ConfigIo`] if the file can't be read,
    /// [`PokelinkError::Config`] if it doesn't parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PokelinkError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validated(mut self) -> Self {
        if self.host.trim().is_empty() {
            tracing::warn!("host is empty, using 127.0.0.1");
            self.host = "127.0.0.1".to_string();
        }
        self.connection = self.connection.validated();
        self.world = self.world.validated();
        self.trade = self.trade.validated();
        self.battle = self.battle.validated();
        self
    }
}
