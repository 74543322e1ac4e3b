//! Events returned from [`Client::update`](crate::Client::update).

use pokelink_battle::BattleEvent;
use pokelink_protocol::{CreatureDescriptor, MapId, PlayerId, ServerErrorCode};
use pokelink_trade::TradeEvent;
use pokelink_world::{AuctionOutcome, ChatLine};

/// Something the host game should show or act on, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The server accepted our login.
    Connected {
        client_id: PlayerId,
        username: String,
    },
    /// The session ended. World, trade, and battle state are already gone.
    Disconnected { reason: String },
    /// The server reported an error. Fatal codes are followed by
    /// `Disconnected`.
    ServerError {
        code: ServerErrorCode,
        message: String,
    },
    Kicked { reason: String },

    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    Chat(ChatLine),

    Trade(TradeEvent),
    Battle(BattleEvent),

    AuctionListings { page: u32 },
    AuctionResult(AuctionOutcome),

    /// An admin gave us a creature; it is already in the inventory.
    CreatureReceived(CreatureDescriptor),
    /// Move the local player.
    Teleport { map_id: MapId, x: i32, y: i32 },
    /// Set the in-game clock.
    TimeSet { hour: u8, minute: u8 },
}
