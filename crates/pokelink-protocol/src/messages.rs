//! Message enums for both directions of the wire.
//!
//! Every message is an envelope `{"type": <string>, "data": <object>}`.
//! Outbound messages ([`ClientMessage`]) are produced with serde's adjacent
//! tagging. Inbound messages ([`ServerMessage`]) are decoded in two steps:
//! the envelope is parsed into a [`RawMessage`], then the `type` string picks
//! the schema `data` must satisfy. A `type` this client does not know becomes
//! [`ServerMessage::Unknown`] so callers can log it and move on.

use serde::{Deserialize, Serialize};

use crate::types::{
    AccountSnapshot, AuctionAction, AuctionListing, BattleDeclineReason,
    BattleFormat, BattleId, BattleResult, ChatChannel, CreatureDescriptor,
    CreatureUid, FollowerDescriptor, MapId, PlayerId, PlayerMovement,
    PlayerSnapshot, Position, ServerErrorCode, TradeDeclineReason, TradeId,
    TurnChoice,
};
use crate::ProtocolError;

/// Protocol version sent in the `auth` message.
pub const PROTOCOL_VERSION: u32 = 3;

// ---------------------------------------------------------------------------
// RawMessage: the envelope before schema validation
// ---------------------------------------------------------------------------

/// An envelope whose payload has not been validated yet.
///
/// `data` defaults to `null` when the field is missing; message types with
/// no payload accept that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// ClientMessage: client → server
// ---------------------------------------------------------------------------

/// Messages this client sends to the server.
///
/// `#[serde(tag = "type", content = "data")]` yields the envelope shape
/// directly, e.g. `{"type":"heartbeat","data":{"client_time":5000}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    // -- Connection lifecycle --
    Auth {
        username: String,
        password: String,
        version: u32,
    },
    Heartbeat {
        client_time: u64,
    },
    Disconnect {
        reason: String,
    },
    SaveState {
        snapshot: AccountSnapshot,
    },
    Pong {
        nonce: u64,
    },

    // -- World --
    PositionUpdate(Position),
    FollowerUpdate {
        follower: Option<FollowerDescriptor>,
    },
    Chat {
        text: String,
        channel: ChatChannel,
    },

    // -- Battle --
    BattleRequest {
        target: PlayerId,
        format: BattleFormat,
    },
    BattleAccept {
        requester: PlayerId,
        party: Vec<CreatureDescriptor>,
    },
    BattleDecline {
        requester: PlayerId,
        reason: BattleDeclineReason,
    },
    BattlePartyRequest {
        opponent: PlayerId,
    },
    BattleParty {
        opponent: PlayerId,
        party: Vec<CreatureDescriptor>,
    },
    BattleReady {
        battle_id: BattleId,
    },
    BattleChoice {
        battle_id: BattleId,
        choice: TurnChoice,
    },
    BattleSwitch {
        battle_id: BattleId,
        turn: u32,
        party_index: u8,
    },
    BattleForfeit {
        battle_id: BattleId,
    },
    BattleEnd {
        battle_id: BattleId,
        result: BattleResult,
    },

    // -- Trade --
    TradeOffer {
        trade_id: TradeId,
        target: PlayerId,
        creature: CreatureDescriptor,
    },
    TradeCounterOffer {
        trade_id: TradeId,
        target: PlayerId,
        creature: CreatureDescriptor,
    },
    TradeConfirm {
        trade_id: TradeId,
        target: PlayerId,
    },
    TradeDecline {
        trade_id: TradeId,
        target: PlayerId,
        reason: TradeDeclineReason,
    },
    TradeComplete {
        trade_id: TradeId,
    },

    // -- Auction house --
    AuctionList {
        creature: CreatureDescriptor,
        price: u32,
    },
    AuctionBrowse {
        page: u32,
    },
    AuctionBuy {
        listing_id: u64,
    },
    AuctionCancel {
        listing_id: u64,
    },
}

impl ClientMessage {
    /// The wire `type` string of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Disconnect { .. } => "disconnect",
            Self::SaveState { .. } => "save_state",
            Self::Pong { .. } => "pong",
            Self::PositionUpdate(_) => "position_update",
            Self::FollowerUpdate { .. } => "follower_update",
            Self::Chat { .. } => "chat",
            Self::BattleRequest { .. } => "battle_request",
            Self::BattleAccept { .. } => "battle_accept",
            Self::BattleDecline { .. } => "battle_decline",
            Self::BattlePartyRequest { .. } => "battle_party_request",
            Self::BattleParty { .. } => "battle_party",
            Self::BattleReady { .. } => "battle_ready",
            Self::BattleChoice { .. } => "battle_choice",
            Self::BattleSwitch { .. } => "battle_switch",
            Self::BattleForfeit { .. } => "battle_forfeit",
            Self::BattleEnd { .. } => "battle_end",
            Self::TradeOffer { .. } => "trade_offer",
            Self::TradeCounterOffer { .. } => "trade_counter_offer",
            Self::TradeConfirm { .. } => "trade_confirm",
            Self::TradeDecline { .. } => "trade_decline",
            Self::TradeComplete { .. } => "trade_complete",
            Self::AuctionList { .. } => "auction_list",
            Self::AuctionBrowse { .. } => "auction_browse",
            Self::AuctionBuy { .. } => "auction_buy",
            Self::AuctionCancel { .. } => "auction_cancel",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: server → client
// ---------------------------------------------------------------------------

/// Messages the server sends to this client.
///
/// The type set is open: the server may add types this client predates.
/// Those decode to [`ServerMessage::Unknown`] rather than failing, which is
/// why the variant is `#[serde(skip)]` and construction goes through
/// [`ServerMessage::from_raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    // -- Connection lifecycle --
    AuthSuccess {
        client_id: PlayerId,
        username: String,
        #[serde(default)]
        snapshot: Option<AccountSnapshot>,
    },
    Error {
        code: ServerErrorCode,
        message: String,
    },
    Ping {
        nonce: u64,
    },

    // -- World --
    PlayerList {
        players: Vec<PlayerSnapshot>,
    },
    PlayerJoined(PlayerSnapshot),
    PlayerLeft {
        id: PlayerId,
    },
    PlayerMoved(PlayerMovement),
    FollowerUpdate {
        id: PlayerId,
        follower: Option<FollowerDescriptor>,
    },
    ActivePlayers {
        map_id: MapId,
        ids: Vec<PlayerId>,
    },
    Chat {
        #[serde(default)]
        from: Option<PlayerId>,
        username: String,
        text: String,
        #[serde(default)]
        channel: ChatChannel,
    },

    // -- Battle --
    BattleRequest {
        from: PlayerId,
        username: String,
        format: BattleFormat,
    },
    BattleAccept {
        from: PlayerId,
        #[serde(default)]
        party: Vec<CreatureDescriptor>,
    },
    BattleDecline {
        from: PlayerId,
        reason: BattleDeclineReason,
    },
    BattlePartyRequest {
        from: PlayerId,
    },
    BattleParty {
        from: PlayerId,
        party: Vec<CreatureDescriptor>,
    },
    BattleStart {
        battle_id: BattleId,
        opponent: PlayerId,
        is_host: bool,
        format: BattleFormat,
    },
    BattleReady {
        battle_id: BattleId,
    },
    BattleChoice {
        battle_id: BattleId,
        choice: TurnChoice,
    },
    BattleSwitch {
        battle_id: BattleId,
        turn: u32,
        party_index: u8,
    },
    BattleForfeit {
        battle_id: BattleId,
    },
    BattleOpponentDisconnected {
        battle_id: BattleId,
    },

    // -- Trade --
    TradeOffer {
        trade_id: TradeId,
        from: PlayerId,
        username: String,
        creature: CreatureDescriptor,
    },
    TradeCounterOffer {
        trade_id: TradeId,
        from: PlayerId,
        creature: CreatureDescriptor,
    },
    TradeConfirm {
        trade_id: TradeId,
        from: PlayerId,
    },
    TradeDecline {
        trade_id: TradeId,
        from: PlayerId,
        reason: TradeDeclineReason,
    },
    TradeExecute {
        trade_id: TradeId,
        give: CreatureUid,
        receive: CreatureDescriptor,
    },

    // -- Auction house --
    AuctionListings {
        page: u32,
        listings: Vec<AuctionListing>,
    },
    AuctionResult {
        action: AuctionAction,
        success: bool,
        #[serde(default)]
        listing_id: Option<u64>,
        #[serde(default)]
        message: String,
    },

    // -- Admin / environment --
    AdminKick {
        reason: String,
    },
    AdminBroadcast {
        text: String,
    },
    AdminGive {
        creature: CreatureDescriptor,
    },
    Teleport {
        map_id: MapId,
        x: i32,
        y: i32,
    },
    TimeSet {
        hour: u8,
        minute: u8,
    },

    /// A message type this client does not recognise.
    #[serde(skip)]
    Unknown { kind: String },
}

/// Every `type` string that maps to a typed [`ServerMessage`] variant.
pub const SERVER_MESSAGE_KINDS: &[&str] = &[
    "auth_success",
    "error",
    "ping",
    "player_list",
    "player_joined",
    "player_left",
    "player_moved",
    "follower_update",
    "active_players",
    "chat",
    "battle_request",
    "battle_accept",
    "battle_decline",
    "battle_party_request",
    "battle_party",
    "battle_start",
    "battle_ready",
    "battle_choice",
    "battle_switch",
    "battle_forfeit",
    "battle_opponent_disconnected",
    "trade_offer",
    "trade_counter_offer",
    "trade_confirm",
    "trade_decline",
    "trade_execute",
    "auction_listings",
    "auction_result",
    "admin_kick",
    "admin_broadcast",
    "admin_give",
    "teleport",
    "time_set",
];

impl ServerMessage {
    /// Validates a raw envelope against the schema for its `type`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] when the type is known
    /// but `data` does not match its schema. Unknown types are not an
    /// error; they yield [`ServerMessage::Unknown`].
    pub fn from_raw(raw: RawMessage) -> Result<Self, ProtocolError> {
        if !SERVER_MESSAGE_KINDS.contains(&raw.kind.as_str()) {
            return Ok(Self::Unknown { kind: raw.kind });
        }
        let RawMessage { kind, data } = raw;
        let mut envelope = serde_json::Map::with_capacity(2);
        envelope.insert("type".into(), serde_json::Value::String(kind.clone()));
        envelope.insert("data".into(), data);
        serde_json::from_value(serde_json::Value::Object(envelope))
            .map_err(|source| ProtocolError::MalformedPayload { kind, source })
    }

    /// The wire `type` string of this message.
    pub fn kind(&self) -> &str {
        match self {
            Self::AuthSuccess { .. } => "auth_success",
            Self::Error { .. } => "error",
            Self::Ping { .. } => "ping",
            Self::PlayerList { .. } => "player_list",
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::PlayerMoved(_) => "player_moved",
            Self::FollowerUpdate { .. } => "follower_update",
            Self::ActivePlayers { .. } => "active_players",
            Self::Chat { .. } => "chat",
            Self::BattleRequest { .. } => "battle_request",
            Self::BattleAccept { .. } => "battle_accept",
            Self::BattleDecline { .. } => "battle_decline",
            Self::BattlePartyRequest { .. } => "battle_party_request",
            Self::BattleParty { .. } => "battle_party",
            Self::BattleStart { .. } => "battle_start",
            Self::BattleReady { .. } => "battle_ready",
            Self::BattleChoice { .. } => "battle_choice",
            Self::BattleSwitch { .. } => "battle_switch",
            Self::BattleForfeit { .. } => "battle_forfeit",
            Self::BattleOpponentDisconnected { .. } => "battle_opponent_disconnected",
            Self::TradeOffer { .. } => "trade_offer",
            Self::TradeCounterOffer { .. } => "trade_counter_offer",
            Self::TradeConfirm { .. } => "trade_confirm",
            Self::TradeDecline { .. } => "trade_decline",
            Self::TradeExecute { .. } => "trade_execute",
            Self::AuctionListings { .. } => "auction_listings",
            Self::AuctionResult { .. } => "auction_result",
            Self::AdminKick { .. } => "admin_kick",
            Self::AdminBroadcast { .. } => "admin_broadcast",
            Self::AdminGive { .. } => "admin_give",
            Self::Teleport { .. } => "teleport",
            Self::TimeSet { .. } => "time_set",
            Self::Unknown { kind } => kind,
        }
    }
}
