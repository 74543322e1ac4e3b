//! Battle configuration, phases, and the per-battle context.

use std::time::{Duration, Instant};

use pokelink_protocol::{
    BattleFormat, BattleId, BattleResult, CombatantStatus, CreatureDescriptor, PlayerId,
    StatusCondition, TurnChoice,
};
use serde::Deserialize;

use crate::BattleRng;

// ---------------------------------------------------------------------------
// BattleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// How long to wait for the opponent's turn (or ready) after we've
    /// sent ours. Expiry wins the battle for us.
    ///
    /// Default: 60.
    pub turn_timeout_secs: u64,

    /// Bound on the party exchange, from accept to battle start.
    ///
    /// Default: 15.
    pub party_timeout_secs: u64,

    /// How long an unanswered request stays open.
    ///
    /// Default: 30.
    pub request_timeout_secs: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 60,
            party_timeout_secs: 15,
            request_timeout_secs: 30,
        }
    }
}

impl BattleConfig {
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("turn_timeout_secs", &mut self.turn_timeout_secs),
            ("party_timeout_secs", &mut self.party_timeout_secs),
            ("request_timeout_secs", &mut self.request_timeout_secs),
        ] {
            if *value == 0 {
                tracing::warn!(field = name, "battle timeout is 0, using 1");
                *value = 1;
            }
        }
        self
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn party_timeout(&self) -> Duration {
        Duration::from_secs(self.party_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// BattlePhase
// ---------------------------------------------------------------------------

/// Where the battle protocol stands.
///
/// ```text
///        ┌─→ RequestSent ─────┐
/// Idle ──┤                    ├─→ PartyExchange ─→ Active ─→ Terminal
///        └─→ RequestReceived ─┘
/// ```
///
/// Declines and negotiation timeouts return to `Idle`. Only a started
/// battle reaches `Terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    Idle,
    RequestSent,
    RequestReceived,
    PartyExchange,
    Active,
    Terminal,
}

impl std::fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::RequestSent => write!(f, "RequestSent"),
            Self::RequestReceived => write!(f, "RequestReceived"),
            Self::PartyExchange => write!(f, "PartyExchange"),
            Self::Active => write!(f, "Active"),
            Self::Terminal => write!(f, "Terminal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a started battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The game reported a natural end.
    Finished,
    OpponentForfeit,
    OpponentDisconnected,
    /// The opponent didn't answer within the turn timeout.
    TurnTimeout,
    LocalForfeit,
    /// The opponent's party never arrived.
    PartyUnavailable,
    /// Our own connection went away.
    ConnectionLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    pub result: BattleResult,
    pub reason: EndReason,
}

/// Why a negotiation ended before a battle started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEnd {
    Declined(pokelink_protocol::BattleDeclineReason),
    TimedOut,
    OpponentLeft,
    PartyUnavailable,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Negotiation and BattleContext
// ---------------------------------------------------------------------------

/// State of a request that hasn't become a battle yet.
#[derive(Debug, Clone)]
pub struct Negotiation {
    pub opponent: PlayerId,
    pub opponent_name: String,
    pub format: BattleFormat,
    /// `true` if we sent the request.
    pub requester: bool,
    pub local_party: Vec<CreatureDescriptor>,
    pub opponent_party: Option<Vec<CreatureDescriptor>>,
    /// A `battle_ready` that beat our own `battle_start`.
    pub(crate) early_ready: Option<BattleId>,
    pub(crate) deadline: Instant,
}

/// A declared-vs-local mismatch in a combatant's post-turn state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    pub party_index: u8,
    pub local_hp: u16,
    pub declared_hp: u16,
    pub local_status: StatusCondition,
    pub declared_status: StatusCondition,
}

/// Everything about a started battle.
#[derive(Debug, Clone)]
pub struct BattleContext {
    pub battle_id: BattleId,
    pub opponent: PlayerId,
    pub is_host: bool,
    pub format: BattleFormat,
    pub opponent_party: Vec<CreatureDescriptor>,
    /// 0 until both sides are ready, then the turn being played.
    pub turn: u32,
    pub local_ready: bool,
    pub remote_ready: bool,
    pub local_choice: Option<TurnChoice>,
    pub remote_choice: Option<TurnChoice>,
    /// The opponent's choice for the last resolved turn.
    pub last_remote: Option<TurnChoice>,
    /// Mismatches recorded so far by `reconcile`.
    pub divergences: Vec<Divergence>,
    pub(crate) rng: BattleRng,
    /// Set while we are waiting on the opponent.
    pub(crate) deadline: Option<Instant>,
}

impl BattleContext {
    pub(crate) fn new(
        battle_id: BattleId,
        opponent: PlayerId,
        is_host: bool,
        format: BattleFormat,
        opponent_party: Vec<CreatureDescriptor>,
    ) -> Self {
        Self {
            battle_id,
            opponent,
            is_host,
            format,
            opponent_party,
            turn: 0,
            local_ready: false,
            remote_ready: false,
            local_choice: None,
            remote_choice: None,
            last_remote: None,
            divergences: Vec::new(),
            rng: BattleRng::for_turn(battle_id, 0),
            deadline: None,
        }
    }

    /// Whether we act first on `turn`. The host acts on odd turns.
    pub fn is_local_acting(&self, turn: u32) -> bool {
        self.is_host == (turn % 2 == 1)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Compares our view of the opponent's party with what they declared.
///
/// Returns one entry per combatant that differs. Declared values are
/// authoritative; the caller overwrites its local state with them.
pub fn reconcile(local: &[CombatantStatus], declared: &[CombatantStatus]) -> Vec<Divergence> {
    declared
        .iter()
        .filter_map(|d| {
            let l = local.iter().find(|l| l.party_index == d.party_index)?;
            (l.hp != d.hp || l.status != d.status).then_some(Divergence {
                party_index: d.party_index,
                local_hp: l.hp,
                declared_hp: d.hp,
                local_status: l.status,
                declared_status: d.status,
            })
        })
        .collect()
}
