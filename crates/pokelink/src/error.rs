//! Unified error type for the Pokelink client.

use pokelink_battle::BattleError;
use pokelink_session::SessionError;
use pokelink_trade::TradeError;

/// Top-level error for the fallible [`Client`](crate::Client) operations.
///
/// Transport and codec faults never reach here: the connection manager
/// folds them into [`SessionError`] or a disconnect.
#[derive(Debug, thiserror::Error)]
pub enum PokelinkError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error(transparent)]
    Battle(#[from] BattleError),

    /// A negotiation was started without a live connection.
    #[error("not connected")]
    NotConnected,

    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The config file is not valid JSON for [`ClientConfig`](crate::ClientConfig).
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    use pokelink_protocol::CreatureUid;
    use pokelink_trade::InventoryError;

    #[test]
    fn test_from_trade_inventory_error_keeps_source() {
        let err = TradeError::from(InventoryError::UnknownCreature(CreatureUid::from("a-1")));
        let err: PokelinkError = err.into();
        assert!(matches!(
            err,
            PokelinkError::Trade(TradeError::Inventory(InventoryError::UnknownCreature(_)))
        ));
        assert!(err.to_string().contains("a-1"));
    }

    #[test]
    fn test_from_session_error() {
        let err: PokelinkError = SessionError::AlreadyConnected.into();
        assert!(matches!(err, PokelinkError::Session(_)));
    }

    #[test]
    fn test_from_trade_error() {
        let err: PokelinkError = TradeError::Busy.into();
        assert!(matches!(err, PokelinkError::Trade(TradeError::Busy)));
    }

    #[test]
    fn test_from_battle_error() {
        let err: PokelinkError = BattleError::AlreadyChosen(3).into();
        assert_eq!(err.to_string(), "already chose for turn 3");
    }
}
