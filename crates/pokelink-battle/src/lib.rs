//! Peer-to-peer battle synchronization for Pokelink.
//!
//! Battles are resolved on both clients. The server only relays; each side
//! resolves locally with the same per-turn seed and sends its choice and
//! post-turn party state. No client is authoritative.
//!
//! # Key types
//!
//! - [`BattleEngine`]: request, party exchange, and the turn loop
//! - [`BattleRng`] / [`turn_seed`]: the shared deterministic RNG
//! - [`BattleContext`]: the running battle
//! - [`await_turn_signal`]: async wait on the opponent, cancelled on disconnect

mod engine;
mod error;
mod seed;
mod state;
mod wait;

pub use engine::{BattleEngine, BattleEvent};
pub use error::BattleError;
pub use seed::{turn_seed, BattleRng};
pub use state::{
    reconcile, BattleConfig, BattleContext, BattleOutcome, BattlePhase, Divergence, EndReason,
    Negotiation, NegotiationEnd,
};
pub use wait::{await_turn_signal, TurnSignal, TurnWait};
