//! Error types for trading and the inventory collaborator.

use pokelink_protocol::CreatureUid;

use crate::TradeState;

/// Errors reported by an [`Inventory`](crate::Inventory).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// No creature with this uid is held.
    #[error("no creature with uid {0}")]
    UnknownCreature(CreatureUid),

    /// The creature is already reserved for a trade.
    #[error("creature {0} is already locked")]
    AlreadyLocked(CreatureUid),

    /// The creature is not reserved, so it can't be unlocked or given away.
    #[error("creature {0} is not locked")]
    NotLocked(CreatureUid),

    /// A creature with this uid is already held.
    #[error("duplicate creature uid {0}")]
    Duplicate(CreatureUid),
}

/// Errors returned to local callers of the trade engine.
///
/// Inbound messages never produce these: faults from the partner's side are
/// logged and turned into state transitions instead.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    /// A trade is already in progress.
    #[error("a trade is already in progress")]
    Busy,

    /// No trade is in progress.
    #[error("no active trade")]
    NoActiveTrade,

    /// The operation isn't valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        state: TradeState,
        operation: &'static str,
    },

    /// Trading with ourselves.
    #[error("cannot trade with yourself")]
    SelfTrade,

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}
