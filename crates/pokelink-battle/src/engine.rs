//! The battle synchronization engine.
//!
//! Drives one battle at a time through request, party exchange, ready
//! handshake, and the turn loop. Each turn:
//!
//! 1. Both sides reseed with [`turn_seed`](crate::turn_seed)`(battle_id, turn)`.
//! 2. We resolve locally and [`submit_choice`](BattleEngine::submit_choice),
//!    which starts the turn deadline.
//! 3. The opponent's choice arrives through [`on_choice`](BattleEngine::on_choice).
//! 4. With both choices in, the turn resolves and the next one begins.
//!
//! If the opponent forfeits, disconnects, or misses the deadline, we win
//! immediately. There is no retry.

use std::collections::VecDeque;
use std::time::Instant;

use pokelink_protocol::{
    BattleDeclineReason, BattleFormat, BattleId, BattleResult, ClientMessage, CombatantStatus,
    CreatureDescriptor, PlayerId, TurnChoice,
};
use tokio::sync::mpsc;

use crate::{
    reconcile, turn_seed, BattleConfig, BattleContext, BattleError, BattleOutcome, BattlePhase,
    BattleRng, Divergence, EndReason, Negotiation, NegotiationEnd, TurnSignal,
};

/// Something the UI or game layer should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    RequestReceived {
        from: PlayerId,
        username: String,
        format: BattleFormat,
    },
    RequestAccepted {
        opponent: PlayerId,
    },
    NegotiationEnded {
        opponent: PlayerId,
        reason: NegotiationEnd,
    },
    PartyReceived {
        opponent: PlayerId,
        party: Vec<CreatureDescriptor>,
    },
    Started {
        battle_id: BattleId,
        opponent: PlayerId,
        is_host: bool,
        format: BattleFormat,
    },
    /// Reseed the game's battle RNG with `seed` before resolving `turn`.
    TurnStarted {
        battle_id: BattleId,
        turn: u32,
        seed: u64,
    },
    OpponentChoice {
        turn: u32,
        choice: TurnChoice,
    },
    OpponentSwitched {
        turn: u32,
        party_index: u8,
    },
    TurnResolved {
        turn: u32,
        local: TurnChoice,
        remote: TurnChoice,
    },
    Ended {
        battle_id: BattleId,
        outcome: BattleOutcome,
    },
}

/// Owns this client's battle.
#[derive(Debug)]
pub struct BattleEngine {
    config: BattleConfig,
    client_id: Option<PlayerId>,
    phase: BattlePhase,
    negotiation: Option<Negotiation>,
    context: Option<BattleContext>,
    outcome: Option<BattleOutcome>,
    events: VecDeque<BattleEvent>,
    signals: Option<mpsc::UnboundedSender<TurnSignal>>,
}

impl BattleEngine {
    pub fn new(config: BattleConfig) -> Self {
        Self {
            config: config.validated(),
            client_id: None,
            phase: BattlePhase::Idle,
            negotiation: None,
            context: None,
            outcome: None,
            events: VecDeque::new(),
            signals: None,
        }
    }

    pub fn set_client_id(&mut self, id: Option<PlayerId>) {
        self.client_id = id;
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.negotiation.as_ref()
    }

    /// The current battle, or the last one while `Terminal`.
    pub fn context(&self) -> Option<&BattleContext> {
        self.context.as_ref()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    /// Whether a negotiation or battle is in progress.
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, BattlePhase::Idle | BattlePhase::Terminal)
    }

    /// Whether we act first on `turn`. `false` outside a battle.
    pub fn is_local_acting(&self, turn: u32) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| ctx.is_local_acting(turn))
    }

    /// Seed of the current turn.
    pub fn current_seed(&self) -> Option<u64> {
        self.context
            .as_ref()
            .filter(|ctx| ctx.turn > 0)
            .map(|ctx| turn_seed(ctx.battle_id, ctx.turn))
    }

    /// The RNG for the current turn, reseeded at every turn start.
    pub fn rng_mut(&mut self) -> Option<&mut BattleRng> {
        match self.phase {
            BattlePhase::Active => self.context.as_mut().map(|ctx| &mut ctx.rng),
            _ => None,
        }
    }

    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        self.events.drain(..).collect()
    }

    /// Publishes opponent turn activity to a new receiver, replacing any
    /// previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TurnSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.signals = Some(tx);
        rx
    }

    /// Returns to `Idle` once a terminal battle has been shown.
    pub fn clear_finished(&mut self) {
        if self.phase == BattlePhase::Terminal {
            self.phase = BattlePhase::Idle;
            self.context = None;
            self.outcome = None;
        }
    }

    // -----------------------------------------------------------------------
    // Negotiation: local side
    // -----------------------------------------------------------------------

    /// Challenges `target`.
    pub fn request(
        &mut self,
        target: PlayerId,
        target_name: impl Into<String>,
        format: BattleFormat,
        local_party: Vec<CreatureDescriptor>,
    ) -> Result<Vec<ClientMessage>, BattleError> {
        self.ensure_free()?;
        if Some(target) == self.client_id {
            return Err(BattleError::SelfBattle);
        }
        check_party(format, &local_party)?;

        self.negotiation = Some(Negotiation {
            opponent: target,
            opponent_name: target_name.into(),
            format,
            requester: true,
            local_party,
            opponent_party: None,
            early_ready: None,
            deadline: Instant::now() + self.config.request_timeout(),
        });
        self.phase = BattlePhase::RequestSent;
        tracing::info!(%target, ?format, "battle requested");
        Ok(vec![ClientMessage::BattleRequest { target, format }])
    }

    /// Accepts the pending request, sending our party along.
    pub fn accept(
        &mut self,
        local_party: Vec<CreatureDescriptor>,
    ) -> Result<Vec<ClientMessage>, BattleError> {
        let deadline = Instant::now() + self.config.party_timeout();
        let neg = self.negotiation_in(BattlePhase::RequestReceived, "accept")?;
        check_party(neg.format, &local_party)?;
        neg.local_party = local_party.clone();
        neg.deadline = deadline;
        let requester = neg.opponent;
        self.phase = BattlePhase::PartyExchange;
        tracing::info!(%requester, "battle request accepted");
        Ok(vec![ClientMessage::BattleAccept {
            requester,
            party: local_party,
        }])
    }

    /// Turns the pending request down.
    pub fn decline_request(
        &mut self,
        reason: BattleDeclineReason,
    ) -> Result<Vec<ClientMessage>, BattleError> {
        let requester = self
            .negotiation_in(BattlePhase::RequestReceived, "decline")?
            .opponent;
        self.end_negotiation(NegotiationEnd::Declined(reason));
        Ok(vec![ClientMessage::BattleDecline { requester, reason }])
    }

    /// Backs out of a negotiation we are part of. No-op otherwise.
    pub fn cancel(&mut self) -> Vec<ClientMessage> {
        let opponent = match (&self.negotiation, self.phase) {
            (
                Some(neg),
                BattlePhase::RequestSent | BattlePhase::RequestReceived | BattlePhase::PartyExchange,
            ) => neg.opponent,
            _ => return Vec::new(),
        };
        self.end_negotiation(NegotiationEnd::Cancelled);
        vec![ClientMessage::BattleDecline {
            requester: opponent,
            reason: BattleDeclineReason::Declined,
        }]
    }

    // -----------------------------------------------------------------------
    // Negotiation: inbound
    // -----------------------------------------------------------------------

    /// Someone challenged us. Auto-declined with `busy` if we are.
    pub fn on_request(
        &mut self,
        from: PlayerId,
        username: String,
        format: BattleFormat,
    ) -> Vec<ClientMessage> {
        if Some(from) == self.client_id {
            return Vec::new();
        }
        if self.ensure_free().is_err() {
            tracing::info!(%from, "auto-declining battle request: busy");
            return vec![ClientMessage::BattleDecline {
                requester: from,
                reason: BattleDeclineReason::Busy,
            }];
        }
        self.negotiation = Some(Negotiation {
            opponent: from,
            opponent_name: username.clone(),
            format,
            requester: false,
            local_party: Vec::new(),
            opponent_party: None,
            early_ready: None,
            deadline: Instant::now() + self.config.request_timeout(),
        });
        self.phase = BattlePhase::RequestReceived;
        self.events.push_back(BattleEvent::RequestReceived {
            from,
            username,
            format,
        });
        Vec::new()
    }

    /// Our request was accepted. Starts the party exchange: we send our
    /// party and, if the accept didn't carry theirs, ask for it.
    pub fn on_accept(&mut self, from: PlayerId, party: Vec<CreatureDescriptor>) -> Vec<ClientMessage> {
        let deadline = Instant::now() + self.config.party_timeout();
        let Ok(neg) = self.negotiation_in(BattlePhase::RequestSent, "handle accept") else {
            tracing::debug!(%from, "battle accept without a pending request");
            return Vec::new();
        };
        if neg.opponent != from {
            tracing::warn!(%from, expected = %neg.opponent, "battle accept from wrong player");
            return Vec::new();
        }
        neg.deadline = deadline;
        let mut out = Vec::new();
        let received = if party.is_empty() {
            out.push(ClientMessage::BattlePartyRequest { opponent: from });
            None
        } else {
            neg.opponent_party = Some(party.clone());
            Some(party)
        };
        out.push(ClientMessage::BattleParty {
            opponent: from,
            party: neg.local_party.clone(),
        });

        self.phase = BattlePhase::PartyExchange;
        self.events.push_back(BattleEvent::RequestAccepted { opponent: from });
        if let Some(party) = received {
            self.events.push_back(BattleEvent::PartyReceived {
                opponent: from,
                party,
            });
        }
        out
    }

    pub fn on_decline(&mut self, from: PlayerId, reason: BattleDeclineReason) {
        let pending = matches!(
            self.phase,
            BattlePhase::RequestSent | BattlePhase::RequestReceived | BattlePhase::PartyExchange
        );
        if pending && self.negotiation.as_ref().is_some_and(|n| n.opponent == from) {
            tracing::info!(%from, ?reason, "battle declined");
            self.end_negotiation(NegotiationEnd::Declined(reason));
        }
    }

    /// The opponent wants our party.
    pub fn on_party_request(&mut self, from: PlayerId) -> Vec<ClientMessage> {
        match (&self.negotiation, self.phase) {
            (Some(neg), BattlePhase::PartyExchange) if neg.opponent == from => {
                vec![ClientMessage::BattleParty {
                    opponent: from,
                    party: neg.local_party.clone(),
                }]
            }
            _ => {
                tracing::debug!(%from, "party request outside party exchange");
                Vec::new()
            }
        }
    }

    pub fn on_party(&mut self, from: PlayerId, party: Vec<CreatureDescriptor>) {
        let Ok(neg) = self.negotiation_in(BattlePhase::PartyExchange, "receive party") else {
            tracing::debug!(%from, "party outside party exchange");
            return;
        };
        if neg.opponent != from {
            return;
        }
        neg.opponent_party = Some(party.clone());
        self.events.push_back(BattleEvent::PartyReceived {
            opponent: from,
            party,
        });
    }

    /// The server started the battle. Sends our ready.
    ///
    /// If the opponent's party never arrived, the battle is aborted right
    /// away.
    pub fn on_start(
        &mut self,
        battle_id: BattleId,
        opponent: PlayerId,
        is_host: bool,
        format: BattleFormat,
    ) -> Vec<ClientMessage> {
        let expected = self.phase == BattlePhase::PartyExchange
            && self.negotiation.as_ref().is_some_and(|n| n.opponent == opponent);
        if !expected {
            tracing::warn!(%battle_id, %opponent, phase = %self.phase, "unexpected battle start");
            return Vec::new();
        }
        let Some(neg) = self.negotiation.take() else {
            return Vec::new();
        };
        if neg.format != format {
            tracing::warn!(%battle_id, requested = ?neg.format, started = ?format, "server changed battle format");
        }

        let party_missing = neg.opponent_party.is_none();
        self.context = Some(BattleContext::new(
            battle_id,
            opponent,
            is_host,
            format,
            neg.opponent_party.unwrap_or_default(),
        ));
        self.phase = BattlePhase::Active;
        tracing::info!(%battle_id, %opponent, is_host, "battle started");
        self.events.push_back(BattleEvent::Started {
            battle_id,
            opponent,
            is_host,
            format,
        });

        if party_missing {
            tracing::warn!(%battle_id, "opponent party unavailable, aborting");
            self.end(BattleResult::Aborted, EndReason::PartyUnavailable);
            return vec![ClientMessage::BattleEnd {
                battle_id,
                result: BattleResult::Aborted,
            }];
        }

        let deadline = Instant::now() + self.config.turn_timeout();
        if let Some(ctx) = self.context.as_mut() {
            ctx.local_ready = true;
            ctx.deadline = Some(deadline);
        }
        if neg.early_ready == Some(battle_id) {
            tracing::debug!(%battle_id, "applying ready received before start");
            self.on_ready(battle_id);
        }
        vec![ClientMessage::BattleReady { battle_id }]
    }

    /// The opponent is ready. Turn 1 begins once both sides are.
    ///
    /// A ready that arrives while we still wait for our own start is kept
    /// on the negotiation and applied by [`on_start`](Self::on_start).
    pub fn on_ready(&mut self, battle_id: BattleId) {
        if self.phase == BattlePhase::PartyExchange {
            if let Some(neg) = self.negotiation.as_mut() {
                neg.early_ready = Some(battle_id);
                return;
            }
        }
        let Some(ctx) = self.context_for(battle_id) else {
            tracing::debug!(%battle_id, "ready for unknown battle");
            return;
        };
        ctx.remote_ready = true;
        if ctx.local_ready && ctx.turn == 0 {
            self.begin_turn(1);
        }
    }

    // -----------------------------------------------------------------------
    // Turn loop
    // -----------------------------------------------------------------------

    /// Sends our resolved choice for the current turn and starts waiting
    /// for the opponent's.
    pub fn submit_choice(&mut self, choice: TurnChoice) -> Result<Vec<ClientMessage>, BattleError> {
        let deadline = Instant::now() + self.config.turn_timeout();
        let ctx = self.active_mut("submit a choice")?;
        if ctx.turn == 0 {
            return Err(BattleError::InvalidPhase {
                phase: BattlePhase::Active,
                operation: "choose before both sides are ready",
            });
        }
        if choice.turn != ctx.turn {
            return Err(BattleError::WrongTurn {
                expected: ctx.turn,
                got: choice.turn,
            });
        }
        if ctx.local_choice.is_some() {
            return Err(BattleError::AlreadyChosen(ctx.turn));
        }

        let msg = ClientMessage::BattleChoice {
            battle_id: ctx.battle_id,
            choice: choice.clone(),
        };
        ctx.local_choice = Some(choice);
        if ctx.remote_choice.is_none() {
            ctx.deadline = Some(deadline);
        }
        self.try_resolve();
        Ok(vec![msg])
    }

    /// The opponent's choice for a turn.
    pub fn on_choice(&mut self, battle_id: BattleId, choice: TurnChoice) {
        let Some(ctx) = self.context_for(battle_id) else {
            tracing::debug!(%battle_id, "choice for unknown battle");
            return;
        };
        if ctx.turn == 0 || choice.turn > ctx.turn {
            tracing::warn!(%battle_id, turn = ctx.turn, got = choice.turn, "choice from the future");
            return;
        }
        if choice.turn < ctx.turn || ctx.remote_choice.is_some() {
            tracing::debug!(%battle_id, got = choice.turn, "duplicate or stale choice");
            return;
        }

        ctx.remote_choice = Some(choice.clone());
        ctx.deadline = None;
        let turn = ctx.turn;
        self.events.push_back(BattleEvent::OpponentChoice {
            turn,
            choice: choice.clone(),
        });
        self.signal(TurnSignal::Choice(choice));
        self.try_resolve();
    }

    /// Tells the opponent which creature we switched in after a faint.
    pub fn send_switch(&mut self, party_index: u8) -> Result<Vec<ClientMessage>, BattleError> {
        let ctx = self.active_mut("switch")?;
        Ok(vec![ClientMessage::BattleSwitch {
            battle_id: ctx.battle_id,
            turn: ctx.turn,
            party_index,
        }])
    }

    pub fn on_switch(&mut self, battle_id: BattleId, turn: u32, party_index: u8) {
        let timeout = self.config.turn_timeout();
        let Some(ctx) = self.context_for(battle_id) else {
            return;
        };
        // The opponent is alive and progressing; give them a fresh window.
        if ctx.deadline.is_some() {
            ctx.deadline = Some(Instant::now() + timeout);
        }
        self.events.push_back(BattleEvent::OpponentSwitched { turn, party_index });
        self.signal(TurnSignal::Switch { turn, party_index });
    }

    /// Compares our view of the opponent's party against their declared
    /// state for the last resolved turn and records any mismatch.
    pub fn reconcile(&mut self, local_view: &[CombatantStatus]) -> Vec<Divergence> {
        let Some(ctx) = self.context.as_mut() else {
            return Vec::new();
        };
        let Some(declared) = ctx.last_remote.as_ref() else {
            return Vec::new();
        };
        let found = reconcile(local_view, &declared.party_state);
        for d in &found {
            tracing::warn!(
                battle_id = %ctx.battle_id,
                party_index = d.party_index,
                local_hp = d.local_hp,
                declared_hp = d.declared_hp,
                "battle state diverged, using declared values"
            );
        }
        ctx.divergences.extend(found.iter().copied());
        found
    }

    // -----------------------------------------------------------------------
    // Ending
    // -----------------------------------------------------------------------

    /// Concedes. We lose.
    pub fn forfeit(&mut self) -> Result<Vec<ClientMessage>, BattleError> {
        let battle_id = self.active_mut("forfeit")?.battle_id;
        self.end(BattleResult::Lost, EndReason::LocalForfeit);
        Ok(vec![
            ClientMessage::BattleForfeit { battle_id },
            ClientMessage::BattleEnd {
                battle_id,
                result: BattleResult::Lost,
            },
        ])
    }

    /// The game decided the battle (e.g. a side ran out of creatures).
    pub fn finish(&mut self, result: BattleResult) -> Result<Vec<ClientMessage>, BattleError> {
        let battle_id = self.active_mut("finish")?.battle_id;
        self.end(result, EndReason::Finished);
        Ok(vec![ClientMessage::BattleEnd { battle_id, result }])
    }

    pub fn on_forfeit(&mut self, battle_id: BattleId) -> Vec<ClientMessage> {
        self.win(battle_id, EndReason::OpponentForfeit)
    }

    pub fn on_opponent_disconnected(&mut self, battle_id: BattleId) -> Vec<ClientMessage> {
        self.win(battle_id, EndReason::OpponentDisconnected)
    }

    /// A player left the server. If it was our opponent, we win; if we were
    /// still negotiating with them, the negotiation ends.
    pub fn on_player_left(&mut self, id: PlayerId) -> Vec<ClientMessage> {
        if let Some(ctx) = self.context.as_ref().filter(|c| c.opponent == id) {
            let battle_id = ctx.battle_id;
            return self.win(battle_id, EndReason::OpponentDisconnected);
        }
        if self.is_busy() && self.negotiation.as_ref().is_some_and(|n| n.opponent == id) {
            self.end_negotiation(NegotiationEnd::OpponentLeft);
        }
        Vec::new()
    }

    /// Checks every deadline against `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<ClientMessage> {
        match self.phase {
            BattlePhase::RequestSent | BattlePhase::RequestReceived => {
                let Some(neg) = self.negotiation.as_ref().filter(|n| now >= n.deadline) else {
                    return Vec::new();
                };
                let out = if self.phase == BattlePhase::RequestReceived {
                    vec![ClientMessage::BattleDecline {
                        requester: neg.opponent,
                        reason: BattleDeclineReason::Timeout,
                    }]
                } else {
                    Vec::new()
                };
                tracing::info!(opponent = %neg.opponent, "battle request timed out");
                self.end_negotiation(NegotiationEnd::TimedOut);
                out
            }
            BattlePhase::PartyExchange => {
                let Some(neg) = self.negotiation.as_ref().filter(|n| now >= n.deadline) else {
                    return Vec::new();
                };
                let opponent = neg.opponent;
                tracing::warn!(%opponent, "party exchange timed out");
                self.end_negotiation(NegotiationEnd::PartyUnavailable);
                vec![ClientMessage::BattleDecline {
                    requester: opponent,
                    reason: BattleDeclineReason::PartyUnavailable,
                }]
            }
            BattlePhase::Active => {
                let Some(ctx) = self
                    .context
                    .as_ref()
                    .filter(|c| c.deadline.is_some_and(|d| now >= d))
                else {
                    return Vec::new();
                };
                let battle_id = ctx.battle_id;
                tracing::info!(%battle_id, turn = ctx.turn, "opponent missed the turn deadline");
                self.win(battle_id, EndReason::TurnTimeout)
            }
            BattlePhase::Idle | BattlePhase::Terminal => Vec::new(),
        }
    }

    /// Our own connection is gone: abort whatever was running, silently.
    pub fn reset(&mut self) {
        match self.phase {
            BattlePhase::Active => self.end(BattleResult::Aborted, EndReason::ConnectionLost),
            BattlePhase::RequestSent | BattlePhase::RequestReceived | BattlePhase::PartyExchange => {
                self.end_negotiation(NegotiationEnd::Cancelled);
            }
            BattlePhase::Idle | BattlePhase::Terminal => {}
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_free(&mut self) -> Result<(), BattleError> {
        match self.phase {
            BattlePhase::Idle => Ok(()),
            BattlePhase::Terminal => {
                self.clear_finished();
                Ok(())
            }
            _ => Err(BattleError::Busy),
        }
    }

    fn negotiation_in(
        &mut self,
        phase: BattlePhase,
        operation: &'static str,
    ) -> Result<&mut Negotiation, BattleError> {
        let current = self.phase;
        match self.negotiation.as_mut() {
            Some(neg) if current == phase => Ok(neg),
            _ => Err(BattleError::InvalidPhase {
                phase: current,
                operation,
            }),
        }
    }

    fn active_mut(&mut self, operation: &'static str) -> Result<&mut BattleContext, BattleError> {
        let phase = self.phase;
        match self.context.as_mut() {
            Some(ctx) if phase == BattlePhase::Active => Ok(ctx),
            _ => Err(BattleError::InvalidPhase { phase, operation }),
        }
    }

    fn context_for(&mut self, battle_id: BattleId) -> Option<&mut BattleContext> {
        if self.phase != BattlePhase::Active {
            return None;
        }
        self.context
            .as_mut()
            .filter(|ctx| ctx.battle_id == battle_id)
    }

    fn begin_turn(&mut self, turn: u32) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        ctx.turn = turn;
        ctx.rng = BattleRng::for_turn(ctx.battle_id, turn);
        ctx.local_choice = None;
        ctx.remote_choice = None;
        ctx.deadline = None;
        let battle_id = ctx.battle_id;
        let seed = turn_seed(battle_id, turn);
        tracing::debug!(%battle_id, turn, "turn started");
        self.events.push_back(BattleEvent::TurnStarted {
            battle_id,
            turn,
            seed,
        });
    }

    fn try_resolve(&mut self) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let (Some(local), Some(remote)) = (ctx.local_choice.clone(), ctx.remote_choice.clone())
        else {
            return;
        };
        ctx.last_remote = Some(remote.clone());
        let turn = ctx.turn;
        self.events.push_back(BattleEvent::TurnResolved {
            turn,
            local,
            remote,
        });
        self.begin_turn(turn + 1);
    }

    fn win(&mut self, battle_id: BattleId, reason: EndReason) -> Vec<ClientMessage> {
        if self.context_for(battle_id).is_none() {
            tracing::debug!(%battle_id, ?reason, "end notice for unknown battle");
            return Vec::new();
        }
        self.end(BattleResult::Won, reason);
        vec![ClientMessage::BattleEnd {
            battle_id,
            result: BattleResult::Won,
        }]
    }

    fn end(&mut self, result: BattleResult, reason: EndReason) {
        let Some(battle_id) = self.context.as_ref().map(|c| c.battle_id) else {
            return;
        };
        if let Some(ctx) = self.context.as_mut() {
            ctx.deadline = None;
        }
        let outcome = BattleOutcome { result, reason };
        self.phase = BattlePhase::Terminal;
        self.outcome = Some(outcome);
        tracing::info!(%battle_id, ?result, ?reason, "battle ended");
        self.events.push_back(BattleEvent::Ended { battle_id, outcome });
        self.signal(TurnSignal::Ended(outcome));
    }

    fn end_negotiation(&mut self, reason: NegotiationEnd) {
        if let Some(neg) = self.negotiation.take() {
            self.events.push_back(BattleEvent::NegotiationEnded {
                opponent: neg.opponent,
                reason,
            });
        }
        self.phase = BattlePhase::Idle;
    }

    fn signal(&mut self, signal: TurnSignal) {
        if let Some(tx) = &self.signals {
            if tx.send(signal).is_err() {
                self.signals = None;
            }
        }
    }
}

fn check_party(format: BattleFormat, party: &[CreatureDescriptor]) -> Result<(), BattleError> {
    let needed = format.active_slots();
    if party.len() < needed {
        return Err(BattleError::NotEnoughPokemon {
            needed,
            available: party.len(),
        });
    }
    Ok(())
}
