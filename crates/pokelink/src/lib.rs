//! # Pokelink
//!
//! Client-side multiplayer sync layer for a single-player RPG.
//!
//! The host game owns one [`Client`], calls [`Client::update`] every frame,
//! and reads the world mirror and interpolator to render remote players.
//! The client keeps a persistent connection to an authoritative server and
//! drives trades and battles to completion through disconnects and
//! timeouts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pokelink::prelude::*;
//!
//! # async fn run() {
//! let config = ClientConfig::default();
//! let mut client = Client::new(config, PartyInventory::new(6), MemoryPersistence::default());
//! if client.connect("Ash", "pikachu").await {
//!     for event in client.update(std::time::Duration::from_millis(16)) {
//!         println!("{event:?}");
//!     }
//! }
//! # }
//! ```

mod client;
mod config;
mod error;
mod events;
mod persistence;
mod router;

pub use client::Client;
pub use config::ClientConfig;
pub use error::PokelinkError;
pub use events::ClientEvent;
pub use persistence::{MemoryPersistence, Persistence};

pub mod prelude {
    //! The types a host game needs day to day.

    pub use crate::{
        Client, ClientConfig, ClientEvent, MemoryPersistence, Persistence, PokelinkError,
    };
    pub use pokelink_battle::{
        await_turn_signal, BattleEvent, BattlePhase, BattleRng, TurnSignal, TurnWait,
    };
    pub use pokelink_protocol::{
        BattleDeclineReason, BattleFormat, BattleResult, ChatChannel, CreatureDescriptor,
        CreatureUid, MapId, PlayerId, Position, TradeDeclineReason, TurnChoice,
    };
    pub use pokelink_session::Credentials;
    pub use pokelink_trade::{Inventory, PartyInventory, TradeEvent, TradeState};
    pub use pokelink_world::{ChatLine, RemotePlayer};
}
