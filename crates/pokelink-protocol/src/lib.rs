//! Wire protocol for Pokelink.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Types** ([`PlayerId`], [`Position`], [`CreatureDescriptor`], ...):
//!   the nouns carried inside messages.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the
//!   `{type, data}` envelopes in each direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], line framing): how those
//!   messages become newline-delimited bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (lines) → Protocol (ServerMessage) → Session (queue) → Router
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::{decode_line, encode_line, Codec, JsonCodec};
pub use error::ProtocolError;
pub use messages::{
    ClientMessage, RawMessage, ServerMessage, PROTOCOL_VERSION,
    SERVER_MESSAGE_KINDS,
};
pub use types::{
    AccountSnapshot, AuctionAction, AuctionListing, BattleAction,
    BattleDeclineReason, BattleFormat, BattleId, BattleResult, ChatChannel,
    CombatantStatus, CreatureDescriptor, CreatureUid, Direction,
    FollowerDescriptor, MapId, PlayerId, PlayerMovement, PlayerSnapshot,
    Position, ServerErrorCode, StatusCondition, TradeDeclineReason, TradeId,
    TurnChoice, SUBUNITS_PER_TILE,
};
