//! The trade negotiation engine.
//!
//! Local operations (`initiate`, `select`, `confirm`, `decline`) return
//! `Result` so the UI can show why something wasn't allowed. Inbound
//! handlers (`on_*`) never fail: anything unexpected from the partner is
//! logged and ignored, or resolves the session to `Declined`.
//!
//! Every method that wants to talk to the server returns the messages to
//! send instead of sending them. The caller owns the connection.
//!
//! # Invariant
//!
//! The offered creature is locked for exactly as long as the session is
//! active. Every path into `Declined` unlocks it; `Complete` gives it away.

use std::collections::VecDeque;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use pokelink_protocol::{
    ClientMessage, CreatureDescriptor, CreatureUid, PlayerId, TradeDeclineReason, TradeId,
};
use rand::Rng;

use crate::{Inventory, TradeConfig, TradeError, TradeRole, TradeSession, TradeState};

/// Something the UI should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    OfferReceived {
        trade_id: TradeId,
        from: PlayerId,
        username: String,
        creature: CreatureDescriptor,
    },
    CounterOfferReceived {
        trade_id: TradeId,
        creature: CreatureDescriptor,
    },
    PartnerConfirmed {
        trade_id: TradeId,
    },
    /// Both sides confirmed; the server will execute.
    Accepted {
        trade_id: TradeId,
    },
    Declined {
        trade_id: TradeId,
        reason: TradeDeclineReason,
        by_partner: bool,
    },
    Completed {
        trade_id: TradeId,
        given: CreatureDescriptor,
        received: CreatureDescriptor,
    },
}

/// Owns the single trade session of this client.
#[derive(Debug)]
pub struct TradeEngine {
    config: TradeConfig,
    client_id: Option<PlayerId>,
    session: Option<TradeSession>,
    events: VecDeque<TradeEvent>,
}

impl TradeEngine {
    pub fn new(config: TradeConfig) -> Self {
        Self {
            config: config.validated(),
            client_id: None,
            session: None,
            events: VecDeque::new(),
        }
    }

    /// Our server-assigned id, used in generated trade ids.
    pub fn set_client_id(&mut self, id: Option<PlayerId>) {
        self.client_id = id;
    }

    pub fn session(&self) -> Option<&TradeSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> Option<TradeState> {
        self.session.as_ref().map(|s| s.state)
    }

    /// Whether a non-terminal session exists.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(TradeSession::is_active)
    }

    pub fn drain_events(&mut self) -> Vec<TradeEvent> {
        self.events.drain(..).collect()
    }

    /// Forgets a terminal session once the UI has shown its outcome.
    pub fn clear_finished(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.is_active()) {
            self.session = None;
        }
    }

    // -----------------------------------------------------------------------
    // Local operations
    // -----------------------------------------------------------------------

    /// Opens a trade with `partner`. The session starts in `Selecting`.
    pub fn start(
        &mut self,
        partner: PlayerId,
        partner_name: impl Into<String>,
    ) -> Result<&TradeSession, TradeError> {
        if self.is_active() {
            return Err(TradeError::Busy);
        }
        if Some(partner) == self.client_id {
            return Err(TradeError::SelfTrade);
        }
        let session = TradeSession::new(
            self.next_trade_id(),
            partner,
            partner_name.into(),
            TradeRole::Initiator,
            TradeState::Selecting,
            self.next_deadline(),
        );
        tracing::info!(trade_id = %session.id, %partner, "trade started");
        Ok(self.session.insert(session))
    }

    /// Locks `uid` and offers it.
    ///
    /// From `Selecting` this sends `trade_offer`; from `WaitingForOffer` it
    /// sends `trade_counter_offer`. If the lock fails nothing changes.
    pub fn select<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        uid: &CreatureUid,
    ) -> Result<Vec<ClientMessage>, TradeError> {
        let deadline = self.next_deadline();
        let session = self.active_mut()?;
        let counter = match session.state {
            TradeState::Selecting => false,
            TradeState::WaitingForOffer => true,
            state => {
                return Err(TradeError::InvalidState {
                    state,
                    operation: "select an offer",
                });
            }
        };

        let creature = inventory.lock(uid)?;
        session.local_offer = Some(creature.clone());
        session.state = TradeState::WaitingForResponse;
        session.deadline = deadline;
        tracing::debug!(trade_id = %session.id, %uid, counter, "offer locked");

        let trade_id = session.id.clone();
        let target = session.partner;
        let msg = if counter {
            ClientMessage::TradeCounterOffer {
                trade_id,
                target,
                creature,
            }
        } else {
            ClientMessage::TradeOffer {
                trade_id,
                target,
                creature,
            }
        };
        Ok(vec![msg])
    }

    /// [`start`](Self::start) and [`select`](Self::select) in one step.
    /// If the selection fails, no session is left behind.
    pub fn initiate<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        partner: PlayerId,
        partner_name: impl Into<String>,
        uid: &CreatureUid,
    ) -> Result<Vec<ClientMessage>, TradeError> {
        self.start(partner, partner_name)?;
        self.select(inventory, uid).inspect_err(|_| {
            self.session = None;
        })
    }

    /// Confirms the current pair of offers.
    ///
    /// Allowed once both offers are known. If the partner already
    /// confirmed, the session moves to `Accepted`.
    pub fn confirm(&mut self) -> Result<Vec<ClientMessage>, TradeError> {
        let deadline = self.next_deadline();
        let session = self.active_mut()?;
        let both_offers = session.local_offer.is_some() && session.partner_offer.is_some();
        let confirmable = match session.state {
            TradeState::Reviewing => true,
            TradeState::WaitingForResponse => both_offers,
            _ => false,
        };
        if !confirmable {
            return Err(TradeError::InvalidState {
                state: session.state,
                operation: "confirm",
            });
        }
        if session.local_confirmed {
            return Ok(Vec::new());
        }

        session.local_confirmed = true;
        session.deadline = deadline;
        let trade_id = session.id.clone();
        let msg = ClientMessage::TradeConfirm {
            trade_id: trade_id.clone(),
            target: session.partner,
        };
        if session.remote_confirmed {
            session.state = TradeState::Accepted;
            tracing::info!(%trade_id, "trade accepted by both sides");
            self.events.push_back(TradeEvent::Accepted { trade_id });
        }
        Ok(vec![msg])
    }

    /// Declines the active trade, unlocking our offer.
    ///
    /// Returns the notice for the partner, or nothing if no trade is
    /// active.
    pub fn decline<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        reason: TradeDeclineReason,
    ) -> Vec<ClientMessage> {
        match self.finish_declined(inventory, reason, false) {
            Some((trade_id, target)) => vec![ClientMessage::TradeDecline {
                trade_id,
                target,
                reason,
            }],
            None => Vec::new(),
        }
    }

    /// Declines with `timeout` if the session has made no progress by
    /// `now`.
    pub fn poll<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        now: Instant,
    ) -> Vec<ClientMessage> {
        match &self.session {
            Some(session) if session.is_active() && now >= session.deadline => {
                tracing::info!(trade_id = %session.id, "trade timed out");
                self.decline(inventory, TradeDeclineReason::Timeout)
            }
            _ => Vec::new(),
        }
    }

    /// Drops the session without notifying anyone. Used when our own
    /// connection is gone.
    pub fn reset<I: Inventory + ?Sized>(&mut self, inventory: &mut I) {
        self.finish_declined(inventory, TradeDeclineReason::Disconnected, false);
        self.session = None;
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    /// A partner offered us a trade.
    ///
    /// Auto-declined with `busy` if a trade is already active, and with
    /// `no_pokemon` if we have nothing to offer back.
    pub fn on_offer<I: Inventory + ?Sized>(
        &mut self,
        inventory: &I,
        trade_id: TradeId,
        from: PlayerId,
        username: String,
        creature: CreatureDescriptor,
    ) -> Vec<ClientMessage> {
        if Some(from) == self.client_id {
            tracing::warn!(%trade_id, "ignoring trade offer from ourselves");
            return Vec::new();
        }
        let auto_decline = if self.is_active() {
            Some(TradeDeclineReason::Busy)
        } else if inventory.available().is_empty() {
            Some(TradeDeclineReason::NoPokemon)
        } else {
            None
        };
        if let Some(reason) = auto_decline {
            tracing::info!(%trade_id, %from, %reason, "auto-declining trade offer");
            return vec![ClientMessage::TradeDecline {
                trade_id,
                target: from,
                reason,
            }];
        }

        let mut session = TradeSession::new(
            trade_id.clone(),
            from,
            username.clone(),
            TradeRole::Recipient,
            TradeState::WaitingForOffer,
            self.next_deadline(),
        );
        session.partner_offer = Some(creature.clone());
        self.session = Some(session);
        tracing::info!(%trade_id, %from, "trade offer received");
        self.events.push_back(TradeEvent::OfferReceived {
            trade_id,
            from,
            username,
            creature,
        });
        Vec::new()
    }

    /// The partner answered our offer, or changed theirs during review.
    pub fn on_counter_offer(
        &mut self,
        trade_id: &TradeId,
        from: PlayerId,
        creature: CreatureDescriptor,
    ) {
        let deadline = self.next_deadline();
        let Some(session) = self.matching_mut(trade_id, from) else {
            tracing::debug!(%trade_id, %from, "counter-offer for unknown trade");
            return;
        };
        match (session.role, session.state) {
            (TradeRole::Initiator, TradeState::WaitingForResponse) => {}
            (_, TradeState::Reviewing) => {
                // A changed offer voids both confirmations.
                session.local_confirmed = false;
                session.remote_confirmed = false;
            }
            (_, state) => {
                tracing::warn!(%trade_id, %state, "unexpected counter-offer");
                return;
            }
        }
        session.partner_offer = Some(creature.clone());
        session.state = TradeState::Reviewing;
        session.deadline = deadline;
        self.events.push_back(TradeEvent::CounterOfferReceived {
            trade_id: trade_id.clone(),
            creature,
        });
    }

    /// The partner confirmed the current pair of offers.
    pub fn on_confirm(&mut self, trade_id: &TradeId, from: PlayerId) {
        let deadline = self.next_deadline();
        let Some(session) = self.matching_mut(trade_id, from) else {
            tracing::debug!(%trade_id, %from, "confirm for unknown trade");
            return;
        };
        let both_offers = session.local_offer.is_some() && session.partner_offer.is_some();
        let expected = match session.state {
            TradeState::Reviewing => true,
            TradeState::WaitingForResponse => both_offers,
            _ => false,
        };
        if !expected {
            tracing::warn!(%trade_id, state = %session.state, "unexpected trade confirm");
            return;
        }

        session.remote_confirmed = true;
        session.deadline = deadline;
        let accepted = session.local_confirmed;
        session.state = if accepted {
            TradeState::Accepted
        } else {
            TradeState::Reviewing
        };
        self.events.push_back(TradeEvent::PartnerConfirmed {
            trade_id: trade_id.clone(),
        });
        if accepted {
            tracing::info!(%trade_id, "trade accepted by both sides");
            self.events.push_back(TradeEvent::Accepted {
                trade_id: trade_id.clone(),
            });
        }
    }

    /// The partner declined.
    pub fn on_decline<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        trade_id: &TradeId,
        from: PlayerId,
        reason: TradeDeclineReason,
    ) {
        if self.matching_mut(trade_id, from).is_none() {
            tracing::debug!(%trade_id, %from, "decline for unknown trade");
            return;
        }
        self.finish_declined(inventory, reason, true);
    }

    /// The server executes the trade: give `give`, receive `receive`.
    ///
    /// Honoured only in `Accepted` and only if `give` is what we locked.
    /// Returns the completion acknowledgement.
    pub fn on_execute<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        trade_id: &TradeId,
        give: &CreatureUid,
        receive: CreatureDescriptor,
    ) -> Vec<ClientMessage> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.is_active() && &s.id == trade_id)
        else {
            tracing::warn!(%trade_id, "execute for unknown trade");
            return Vec::new();
        };
        if session.state != TradeState::Accepted
            || !(session.local_confirmed && session.remote_confirmed)
        {
            tracing::warn!(%trade_id, state = %session.state, "execute before both confirmed");
            return Vec::new();
        }
        if !session.local_offer.as_ref().is_some_and(|o| &o.uid == give) {
            tracing::warn!(%trade_id, %give, "execute names a creature we did not offer");
            return Vec::new();
        }

        match inventory.exchange(give, receive.clone()) {
            Ok(given) => {
                session.partner_offer = Some(receive.clone());
                session.state = TradeState::Complete;
                tracing::info!(%trade_id, gave = %given.uid, got = %receive.uid, "trade complete");
                self.events.push_back(TradeEvent::Completed {
                    trade_id: trade_id.clone(),
                    given,
                    received: receive,
                });
                vec![ClientMessage::TradeComplete {
                    trade_id: trade_id.clone(),
                }]
            }
            Err(e) => {
                tracing::error!(%trade_id, error = %e, "trade exchange failed");
                self.decline(inventory, TradeDeclineReason::Cancelled)
            }
        }
    }

    /// A player left the server. Resets the trade if it was our partner.
    pub fn on_partner_left<I: Inventory + ?Sized>(&mut self, inventory: &mut I, id: PlayerId) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.is_active() && s.partner == id)
        {
            self.finish_declined(inventory, TradeDeclineReason::Disconnected, true);
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn active_mut(&mut self) -> Result<&mut TradeSession, TradeError> {
        self.session
            .as_mut()
            .filter(|s| s.is_active())
            .ok_or(TradeError::NoActiveTrade)
    }

    fn matching_mut(&mut self, trade_id: &TradeId, from: PlayerId) -> Option<&mut TradeSession> {
        self.session
            .as_mut()
            .filter(|s| s.matches(trade_id, from))
    }

    /// Moves the active session to `Declined` and unlocks our offer.
    /// Returns the trade id and partner, or `None` if nothing was active.
    fn finish_declined<I: Inventory + ?Sized>(
        &mut self,
        inventory: &mut I,
        reason: TradeDeclineReason,
        by_partner: bool,
    ) -> Option<(TradeId, PlayerId)> {
        let session = self.session.as_mut().filter(|s| s.is_active())?;
        if let Some(offer) = &session.local_offer {
            if let Err(e) = inventory.unlock(&offer.uid) {
                tracing::warn!(trade_id = %session.id, error = %e, "failed to unlock offer");
            }
        }
        session.state = TradeState::Declined;
        session.decline_reason = Some(reason);
        let trade_id = session.id.clone();
        let partner = session.partner;
        tracing::info!(%trade_id, %reason, by_partner, "trade declined");
        self.events.push_back(TradeEvent::Declined {
            trade_id: trade_id.clone(),
            reason,
            by_partner,
        });
        Some((trade_id, partner))
    }

    fn next_deadline(&self) -> Instant {
        Instant::now() + self.config.timeout()
    }

    /// `clientId_timestampMillis_random`.
    fn next_trade_id(&self) -> TradeId {
        let client = self.client_id.map_or(0, |id| id.0);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: u32 = rand::rng().random_range(0..1_000_000);
        TradeId(format!("{client}_{millis}_{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for `TradeEngine`, one side at a time.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`.

    use std::time::Duration;

    use super::*;
    use crate::PartyInventory;

    const PARTNER: PlayerId = PlayerId(2);

    fn mon(uid: &str, species: &str) -> CreatureDescriptor {
        CreatureDescriptor::new(uid, species, 10)
    }

    fn setup() -> (TradeEngine, PartyInventory) {
        let mut engine = TradeEngine::new(TradeConfig::default());
        engine.set_client_id(Some(PlayerId(1)));
        let inv = PartyInventory::with_creatures([mon("a", "bulbasaur"), mon("b", "rattata")]);
        (engine, inv)
    }

    fn trade_id(engine: &TradeEngine) -> TradeId {
        engine.session().unwrap().id.clone()
    }

    #[test]
    fn test_initiate_locks_and_sends_offer() {
        let (mut engine, mut inv) = setup();
        let out = engine
            .initiate(&mut inv, PARTNER, "Misty", &"a".into())
            .unwrap();

        assert!(matches!(&out[..], [ClientMessage::TradeOffer { target, .. }] if *target == PARTNER));
        assert_eq!(engine.state(), Some(TradeState::WaitingForResponse));
        assert!(inv.is_locked(&"a".into()));
        assert!(trade_id(&engine).0.starts_with("1_"));
    }

    #[test]
    fn test_initiate_unknown_creature_leaves_no_session() {
        let (mut engine, mut inv) = setup();
        let result = engine.initiate(&mut inv, PARTNER, "Misty", &"zzz".into());
        assert!(matches!(result, Err(TradeError::Inventory(_))));
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_start_with_self_fails() {
        let (mut engine, _) = setup();
        assert!(matches!(
            engine.start(PlayerId(1), "me"),
            Err(TradeError::SelfTrade)
        ));
    }

    #[test]
    fn test_start_while_active_returns_busy() {
        let (mut engine, _) = setup();
        engine.start(PARTNER, "Misty").unwrap();
        assert!(matches!(
            engine.start(PlayerId(3), "Brock"),
            Err(TradeError::Busy)
        ));
    }

    #[test]
    fn test_decline_before_response_restores_availability() {
        let (mut engine, mut inv) = setup();
        let before = inv.available().len();

        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        assert_eq!(inv.available().len(), before - 1);
        let out = engine.decline(&mut inv, TradeDeclineReason::Cancelled);

        assert_eq!(inv.available().len(), before);
        assert!(matches!(
            &out[..],
            [ClientMessage::TradeDecline { reason: TradeDeclineReason::Cancelled, .. }]
        ));
        assert_eq!(engine.state(), Some(TradeState::Declined));
    }

    #[test]
    fn test_decline_without_trade_sends_nothing() {
        let (mut engine, mut inv) = setup();
        assert!(engine.decline(&mut inv, TradeDeclineReason::Cancelled).is_empty());
    }

    #[test]
    fn test_on_offer_while_active_auto_declines_busy() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let own_id = trade_id(&engine);

        let out = engine.on_offer(
            &inv,
            TradeId("3_1_1".into()),
            PlayerId(3),
            "Brock".into(),
            mon("x", "onix"),
        );

        assert!(matches!(
            &out[..],
            [ClientMessage::TradeDecline { reason: TradeDeclineReason::Busy, target, .. }] if *target == PlayerId(3)
        ));
        // The existing trade is untouched.
        assert_eq!(trade_id(&engine), own_id);
        assert_eq!(engine.state(), Some(TradeState::WaitingForResponse));
    }

    #[test]
    fn test_on_offer_with_empty_inventory_declines_no_pokemon() {
        let mut engine = TradeEngine::new(TradeConfig::default());
        let inv = PartyInventory::default();
        let out = engine.on_offer(&inv, TradeId("t".into()), PARTNER, "Misty".into(), mon("x", "staryu"));
        assert!(matches!(
            &out[..],
            [ClientMessage::TradeDecline { reason: TradeDeclineReason::NoPokemon, .. }]
        ));
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_on_offer_creates_recipient_session() {
        let (mut engine, mut inv) = setup();
        let id = TradeId("2_5_5".into());
        engine.on_offer(&inv, id.clone(), PARTNER, "Misty".into(), mon("x", "staryu"));
        assert_eq!(engine.state(), Some(TradeState::WaitingForOffer));

        let out = engine.select(&mut inv, &"b".into()).unwrap();
        assert!(matches!(&out[..], [ClientMessage::TradeCounterOffer { trade_id, .. }] if *trade_id == id));
        assert_eq!(engine.state(), Some(TradeState::WaitingForResponse));
        assert!(matches!(
            engine.drain_events().first(),
            Some(TradeEvent::OfferReceived { .. })
        ));
    }

    #[test]
    fn test_confirm_before_offers_known_fails() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        assert!(matches!(
            engine.confirm(),
            Err(TradeError::InvalidState { state: TradeState::WaitingForResponse, .. })
        ));
    }

    #[test]
    fn test_confirm_in_either_order_reaches_accepted() {
        // Local first.
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.confirm().unwrap();
        assert_eq!(engine.state(), Some(TradeState::Reviewing));
        engine.on_confirm(&id, PARTNER);
        assert_eq!(engine.state(), Some(TradeState::Accepted));

        // Remote first.
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.on_confirm(&id, PARTNER);
        assert_eq!(engine.state(), Some(TradeState::Reviewing));
        engine.confirm().unwrap();
        assert_eq!(engine.state(), Some(TradeState::Accepted));
    }

    #[test]
    fn test_on_counter_offer_during_review_voids_confirmations() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.confirm().unwrap();

        engine.on_counter_offer(&id, PARTNER, mon("y", "starmie"));

        let session = engine.session().unwrap();
        assert!(!session.local_confirmed);
        assert_eq!(session.partner_offer.as_ref().unwrap().species, "starmie");
    }

    #[test]
    fn test_on_confirm_from_stranger_is_ignored() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.on_confirm(&id, PlayerId(99));
        assert!(!engine.session().unwrap().remote_confirmed);
    }

    #[test]
    fn test_on_execute_before_accepted_is_ignored() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));

        let out = engine.on_execute(&mut inv, &id, &"a".into(), mon("x", "staryu"));

        assert!(out.is_empty());
        assert!(inv.contains(&"a".into()));
        assert!(!inv.contains(&"x".into()));
    }

    #[test]
    fn test_on_execute_swaps_and_acknowledges() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.confirm().unwrap();
        engine.on_confirm(&id, PARTNER);

        let out = engine.on_execute(&mut inv, &id, &"a".into(), mon("x", "staryu"));

        assert_eq!(out, vec![ClientMessage::TradeComplete { trade_id: id }]);
        assert_eq!(engine.state(), Some(TradeState::Complete));
        assert!(!inv.contains(&"a".into()));
        assert!(inv.contains(&"x".into()));
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn test_on_execute_wrong_uid_is_ignored() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        let id = trade_id(&engine);
        engine.on_counter_offer(&id, PARTNER, mon("x", "staryu"));
        engine.confirm().unwrap();
        engine.on_confirm(&id, PARTNER);

        let out = engine.on_execute(&mut inv, &id, &"b".into(), mon("x", "staryu"));

        assert!(out.is_empty());
        assert!(inv.contains(&"b".into()));
        assert_eq!(engine.state(), Some(TradeState::Accepted));
    }

    #[test]
    fn test_poll_after_deadline_declines_timeout() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();

        assert!(engine.poll(&mut inv, Instant::now()).is_empty());
        let out = engine.poll(&mut inv, Instant::now() + Duration::from_secs(121));

        assert!(matches!(
            &out[..],
            [ClientMessage::TradeDecline { reason: TradeDeclineReason::Timeout, .. }]
        ));
        assert!(!inv.is_locked(&"a".into()));
    }

    #[test]
    fn test_on_partner_left_resets_with_disconnected() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();

        engine.on_partner_left(&mut inv, PARTNER);

        assert_eq!(engine.state(), Some(TradeState::Declined));
        assert_eq!(
            engine.session().unwrap().decline_reason,
            Some(TradeDeclineReason::Disconnected)
        );
        assert!(!inv.is_locked(&"a".into()));
    }

    #[test]
    fn test_clear_finished_allows_new_trade() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        engine.decline(&mut inv, TradeDeclineReason::Cancelled);

        // A terminal session doesn't block a new one.
        engine.start(PlayerId(3), "Brock").unwrap();
        engine.decline(&mut inv, TradeDeclineReason::Cancelled);
        engine.clear_finished();
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_reset_unlocks_and_forgets() {
        let (mut engine, mut inv) = setup();
        engine.initiate(&mut inv, PARTNER, "Misty", &"a".into()).unwrap();
        engine.reset(&mut inv);
        assert!(engine.session().is_none());
        assert!(!inv.is_locked(&"a".into()));
    }
}
