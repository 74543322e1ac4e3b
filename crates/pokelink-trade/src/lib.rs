//! Two-party creature trading for Pokelink.
//!
//! # Key types
//!
//! - [`TradeEngine`]: the negotiation state machine (one session at a time)
//! - [`TradeSession`] / [`TradeState`]: the session and where it stands
//! - [`Inventory`]: what the engine needs from the game's creature storage
//! - [`PartyInventory`]: in-memory inventory (party + box)
//! - [`TradeEvent`]: notifications for the UI
//!
//! The engine never touches the network. Its methods return the
//! [`ClientMessage`](pokelink_protocol::ClientMessage)s to send.

mod engine;
mod error;
mod inventory;
mod state;

pub use engine::{TradeEngine, TradeEvent};
pub use error::{InventoryError, TradeError};
pub use inventory::{Inventory, PartyInventory};
pub use state::{TradeConfig, TradeRole, TradeSession, TradeState};
