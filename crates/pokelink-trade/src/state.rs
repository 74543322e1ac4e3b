//! Trade session state and configuration.

use std::time::{Duration, Instant};

use pokelink_protocol::{CreatureDescriptor, PlayerId, TradeDeclineReason, TradeId};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// TradeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    /// A trade with no progress for this long declines itself.
    ///
    /// Default: 120.
    pub timeout_secs: u64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl TradeConfig {
    pub fn validated(mut self) -> Self {
        if self.timeout_secs == 0 {
            tracing::warn!("trade timeout_secs is 0, using 1");
            self.timeout_secs = 1;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// TradeState
// ---------------------------------------------------------------------------

/// Where a trade session is in its negotiation.
///
/// ```text
///  initiator:  Selecting ──(offer)──→ WaitingForResponse ──(counter)──→ Reviewing
///  recipient:  WaitingForOffer ──(counter)──→ WaitingForResponse ──(confirm)──→ Reviewing
///
///  Reviewing ──(both confirmed)──→ Accepted ──(execute)──→ Complete
///  any active state ──(decline / timeout / partner gone)──→ Declined
/// ```
///
/// `Declined` and `Complete` are terminal. A terminal session is kept only
/// so the UI can show the outcome; it holds no locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    /// We received an offer and are choosing what to give back.
    WaitingForOffer,
    /// We started a trade and are choosing what to offer.
    Selecting,
    /// Our offer is out; waiting on the partner.
    WaitingForResponse,
    /// Both offers are known; waiting on confirmations.
    Reviewing,
    /// Both sides confirmed; waiting for the server to execute.
    Accepted,
    Declined,
    Complete,
}

impl TradeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Complete)
    }
}

impl std::fmt::Display for TradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WaitingForOffer => "WaitingForOffer",
            Self::Selecting => "Selecting",
            Self::WaitingForResponse => "WaitingForResponse",
            Self::Reviewing => "Reviewing",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Complete => "Complete",
        };
        f.write_str(s)
    }
}

/// Which side opened the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeRole {
    Initiator,
    Recipient,
}

// ---------------------------------------------------------------------------
// TradeSession
// ---------------------------------------------------------------------------

/// The one trade this client may have at a time.
#[derive(Debug, Clone)]
pub struct TradeSession {
    pub id: TradeId,
    pub partner: PlayerId,
    pub partner_name: String,
    pub role: TradeRole,
    /// What we offered. Locked in the inventory while the session is active.
    pub local_offer: Option<CreatureDescriptor>,
    pub partner_offer: Option<CreatureDescriptor>,
    pub local_confirmed: bool,
    pub remote_confirmed: bool,
    pub state: TradeState,
    /// Set once the session is declined.
    pub decline_reason: Option<TradeDeclineReason>,
    pub(crate) deadline: Instant,
}

impl TradeSession {
    pub(crate) fn new(
        id: TradeId,
        partner: PlayerId,
        partner_name: String,
        role: TradeRole,
        state: TradeState,
        deadline: Instant,
    ) -> Self {
        Self {
            id,
            partner,
            partner_name,
            role,
            local_offer: None,
            partner_offer: None,
            local_confirmed: false,
            remote_confirmed: false,
            state,
            decline_reason: None,
            deadline,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether this session is the one a message refers to.
    pub(crate) fn matches(&self, trade_id: &TradeId, from: PlayerId) -> bool {
        self.is_active() && &self.id == trade_id && self.partner == from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_state_terminal_states() {
        assert!(TradeState::Declined.is_terminal());
        assert!(TradeState::Complete.is_terminal());
        assert!(!TradeState::Accepted.is_terminal());
        assert!(!TradeState::WaitingForOffer.is_terminal());
    }

    #[test]
    fn test_trade_config_validated_clamps_zero() {
        let cfg = TradeConfig { timeout_secs: 0 }.validated();
        assert_eq!(cfg.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_session_matches_requires_id_partner_and_activity() {
        let id = TradeId("1_2_3".into());
        let mut session = TradeSession::new(
            id.clone(),
            PlayerId(2),
            "Misty".into(),
            TradeRole::Initiator,
            TradeState::WaitingForResponse,
            Instant::now(),
        );
        assert!(session.matches(&id, PlayerId(2)));
        assert!(!session.matches(&id, PlayerId(3)));
        assert!(!session.matches(&TradeId("other".into()), PlayerId(2)));
        session.state = TradeState::Declined;
        assert!(!session.matches(&id, PlayerId(2)));
    }
}
