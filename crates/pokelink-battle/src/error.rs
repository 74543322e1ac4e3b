//! Error types for the battle layer.

use crate::BattlePhase;

/// Errors returned to local callers of the battle engine.
///
/// Like trading, inbound faults never surface here; they are logged or
/// resolve the battle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BattleError {
    /// A battle or negotiation is already in progress.
    #[error("already in a battle")]
    Busy,

    /// Battling ourselves.
    #[error("cannot battle yourself")]
    SelfBattle,

    /// The operation isn't valid in the current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidPhase {
        phase: BattlePhase,
        operation: &'static str,
    },

    /// The party is too small for the requested format.
    #[error("format needs {needed} creatures, party has {available}")]
    NotEnoughPokemon { needed: usize, available: usize },

    /// A choice was submitted for a turn other than the current one.
    #[error("choice is for turn {got}, current turn is {expected}")]
    WrongTurn { expected: u32, got: u32 },

    /// A choice was already submitted for this turn.
    #[error("already chose for turn {0}")]
    AlreadyChosen(u32),
}
