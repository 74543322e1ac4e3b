//! Async wait for the opponent's turn.
//!
//! The engine itself is polled from the frame loop. Game code that prefers
//! to `await` the opponent subscribes to [`TurnSignal`]s and waits with
//! [`await_turn_signal`], which gives up on a deadline or as soon as the
//! connection goes away.

use std::time::Duration;

use pokelink_protocol::TurnChoice;
use tokio::sync::{mpsc, watch};

use crate::BattleOutcome;

/// Something the opponent did that a waiting turn cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnSignal {
    Choice(TurnChoice),
    Switch { turn: u32, party_index: u8 },
    Ended(BattleOutcome),
}

/// How a wait finished.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnWait {
    Signal(TurnSignal),
    TimedOut,
    /// The connection dropped, or the engine stopped publishing.
    Cancelled,
}

/// Waits for the next signal, at most `timeout`.
///
/// `liveness` is the connection's liveness channel: a `false` value (or a
/// dropped sender) cancels the wait immediately.
pub async fn await_turn_signal(
    signals: &mut mpsc::UnboundedReceiver<TurnSignal>,
    timeout: Duration,
    liveness: &mut watch::Receiver<bool>,
) -> TurnWait {
    if !*liveness.borrow_and_update() {
        return TurnWait::Cancelled;
    }
    tokio::select! {
        signal = signals.recv() => match signal {
            Some(signal) => TurnWait::Signal(signal),
            None => TurnWait::Cancelled,
        },
        () = tokio::time::sleep(timeout) => TurnWait::TimedOut,
        _ = liveness.wait_for(|alive| !*alive) => TurnWait::Cancelled,
    }
}
