//! Core protocol types shared by every message on the wire.
//!
//! These are the nouns of the protocol: who a player is, where they stand,
//! what a creature looks like when it crosses the network. The message
//! enums in [`crate::messages`] are built out of them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-assigned player identifier.
///
/// Newtype over `u64` so a `PlayerId` can never be passed where a
/// [`BattleId`] is expected. `#[serde(transparent)]` keeps the wire shape a
/// plain number: `PlayerId(42)` is `42` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A server-issued battle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(pub u64);

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

/// Identifier of a game map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Client-generated trade session identifier.
///
/// Format is `clientId_timestampMillis_random`, which keeps ids unique across
/// clients without coordination. The protocol layer treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub String);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a single creature, preserved across trades.
///
/// Inventory lookups go through this, never through party slot indices,
/// because slots shift as creatures are locked or removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatureUid(pub String);

impl fmt::Display for CreatureUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CreatureUid {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Facing direction of a character sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Down,
    Left,
    Right,
    Up,
}

fn default_move_speed() -> u8 {
    4
}

/// A character's position as reported on the wire.
///
/// `x`/`y` are tile coordinates; `real_x`/`real_y` are sub-tile coordinates
/// in [`SUBUNITS_PER_TILE`] units per tile, so a character standing still on
/// tile (3, 5) reports `real_x = 3 * 128`, `real_y = 5 * 128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub map_id: MapId,
    pub x: i32,
    pub y: i32,
    pub real_x: i32,
    pub real_y: i32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub pattern: u8,
    #[serde(default = "default_move_speed")]
    pub move_speed: u8,
}

/// Sub-tile units per tile along each axis.
pub const SUBUNITS_PER_TILE: i32 = 128;

impl Position {
    /// A standing position on the given tile.
    pub fn on_tile(map_id: MapId, x: i32, y: i32) -> Self {
        Self {
            map_id,
            x,
            y,
            real_x: x.saturating_mul(SUBUNITS_PER_TILE),
            real_y: y.saturating_mul(SUBUNITS_PER_TILE),
            direction: Direction::Down,
            pattern: 0,
            move_speed: default_move_speed(),
        }
    }
}

/// A companion creature walking behind a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerDescriptor {
    pub species: String,
    #[serde(default)]
    pub shiny: bool,
    #[serde(default)]
    pub charset: String,
}

/// Everything the server knows about another player at a point in time.
///
/// Sent in roster snapshots (`player_list`) and join notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub username: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub charset: String,
    #[serde(default)]
    pub follower: Option<FollowerDescriptor>,
}

/// A position broadcast for one remote player (`player_moved`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMovement {
    pub id: PlayerId,
    #[serde(flatten)]
    pub position: Position,
}

// ---------------------------------------------------------------------------
// Creatures
// ---------------------------------------------------------------------------

/// Wire form of a creature.
///
/// The sync layer only reads `uid`, `species` and `level`. Everything else
/// the game needs to rebuild the creature (moves, stats, held item) rides in
/// `data` and is interpreted by the inventory collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureDescriptor {
    pub uid: CreatureUid,
    pub species: String,
    pub level: u8,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CreatureDescriptor {
    /// A descriptor with no extra game data.
    pub fn new(uid: impl Into<String>, species: impl Into<String>, level: u8) -> Self {
        Self {
            uid: CreatureUid(uid.into()),
            species: species.into(),
            level,
            nickname: None,
            data: serde_json::Value::Null,
        }
    }
}

/// Opaque full-account snapshot exchanged with the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountSnapshot(pub serde_json::Value);

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Where a chat line was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    #[default]
    Global,
    Map,
    Whisper,
    System,
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// Why a trade ended without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDeclineReason {
    Busy,
    Cancelled,
    Declined,
    NoPokemon,
    Timeout,
    Disconnected,
}

impl fmt::Display for TradeDeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
            Self::NoPokemon => "no_pokemon",
            Self::Timeout => "timeout",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Battle
// ---------------------------------------------------------------------------

/// Battle format requested in `battle_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleFormat {
    #[default]
    Single,
    Double,
    Triple,
    Rotation,
}

impl BattleFormat {
    /// Number of creatures each side has on the field at once.
    pub fn active_slots(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple | Self::Rotation => 3,
        }
    }
}

/// Why a battle request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleDeclineReason {
    Busy,
    Declined,
    NotEnoughPokemon,
    Timeout,
    PartyUnavailable,
}

/// A single action a side takes in one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleAction {
    Move { slot: u8, move_index: u8, target: u8 },
    Switch { slot: u8, party_index: u8 },
    Item { item_id: u32, target: u8 },
    Run,
}

/// Non-volatile status condition of a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCondition {
    #[default]
    #[serde(rename = "none")]
    Healthy,
    Sleep,
    Poison,
    Toxic,
    Burn,
    Freeze,
    Paralysis,
    Fainted,
}

/// Post-resolution HP and status of one party member, sent as an integrity
/// check alongside each turn's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantStatus {
    pub party_index: u8,
    pub hp: u16,
    #[serde(default)]
    pub status: StatusCondition,
}

/// One side's complete turn: its actions and its resulting party state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnChoice {
    pub turn: u32,
    pub actions: Vec<BattleAction>,
    #[serde(default)]
    pub party_state: Vec<CombatantStatus>,
}

/// Final result reported by a client when its battle ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleResult {
    Won,
    Lost,
    Draw,
    Aborted,
}

// ---------------------------------------------------------------------------
// Auction house
// ---------------------------------------------------------------------------

/// A creature listed for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionListing {
    pub listing_id: u64,
    pub seller: String,
    pub creature: CreatureDescriptor,
    pub price: u32,
}

/// Which auction operation an `auction_result` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionAction {
    List,
    Buy,
    Cancel,
}

// ---------------------------------------------------------------------------
// Server errors
// ---------------------------------------------------------------------------

/// Typed error codes the server attaches to `error` messages.
///
/// Unrecognised codes fall into [`ServerErrorCode::Other`] instead of failing
/// the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerErrorCode {
    AuthFailed,
    VersionMismatch,
    DuplicateLogin,
    Banned,
    ServerFull,
    #[serde(other)]
    Other,
}

impl ServerErrorCode {
    /// Whether the session must be torn down after this error.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(BattleId(3).to_string(), "B-3");
        assert_eq!(MapId(12).to_string(), "M-12");
        assert_eq!(TradeId("1_2_3".into()).to_string(), "1_2_3");
    }

    #[test]
    fn test_position_on_tile_sets_subunits() {
        let pos = Position::on_tile(MapId(1), 3, 5);
        assert_eq!(pos.real_x, 3 * SUBUNITS_PER_TILE);
        assert_eq!(pos.real_y, 5 * SUBUNITS_PER_TILE);
    }

    #[test]
    fn test_player_snapshot_flattens_position() {
        let json = r#"{
            "id": 4, "username": "Misty", "map_id": 2,
            "x": 1, "y": 2, "real_x": 128, "real_y": 256,
            "direction": "left"
        }"#;
        let snap: PlayerSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.id, PlayerId(4));
        assert_eq!(snap.position.direction, Direction::Left);
        // Missing optional fields fall back to defaults.
        assert_eq!(snap.position.move_speed, 4);
        assert!(snap.follower.is_none());
    }

    #[test]
    fn test_status_condition_healthy_is_none_on_wire() {
        let json = serde_json::to_string(&StatusCondition::Healthy).unwrap();
        assert_eq!(json, "\"none\"");
    }

    #[test]
    fn test_battle_action_is_internally_tagged() {
        let action = BattleAction::Move { slot: 0, move_index: 2, target: 1 };
        let json = serde_json::to_value(action).unwrap();
        assert_eq!(json["kind"], "move");
        assert_eq!(json["move_index"], 2);
    }

    #[test]
    fn test_server_error_code_unknown_maps_to_other() {
        let code: ServerErrorCode = serde_json::from_str("\"rate_limited\"").unwrap();
        assert_eq!(code, ServerErrorCode::Other);
        assert!(!code.is_fatal());
        assert!(ServerErrorCode::DuplicateLogin.is_fatal());
    }

    #[test]
    fn test_trade_decline_reason_display_matches_wire() {
        for reason in [
            TradeDeclineReason::Busy,
            TradeDeclineReason::NoPokemon,
            TradeDeclineReason::Timeout,
        ] {
            let wire = serde_json::to_value(reason).unwrap();
            assert_eq!(wire, reason.to_string());
        }
    }

    #[test]
    fn test_battle_format_active_slots() {
        assert_eq!(BattleFormat::Single.active_slots(), 1);
        assert_eq!(BattleFormat::Double.active_slots(), 2);
        assert_eq!(BattleFormat::Rotation.active_slots(), 3);
    }
}
