//! The `Client` context object.
//!
//! One per process. It owns the connection, the world mirror, and both
//! negotiation engines, and is driven by the host's frame loop:
//!
//! ```rust,ignore
//! let mut client = Client::new(ClientConfig::default(), inventory, persistence);
//! client.connect("Ash", "pikachu").await;
//! loop {
//!     for event in client.update(frame_time) {
//!         // show it
//!     }
//!     // render client.world() and client.interpolator()
//! }
//! ```

use std::time::{Duration, Instant};

use pokelink_battle::{BattleEngine, TurnSignal};
use pokelink_protocol::{
    BattleDeclineReason, BattleFormat, BattleResult, ChatChannel, ClientMessage,
    CreatureDescriptor, CreatureUid, FollowerDescriptor, PlayerId, Position,
    TradeDeclineReason, TurnChoice,
};
use pokelink_session::{ConnectionManager, Credentials, LastError};
use pokelink_trade::{Inventory, TradeEngine};
use pokelink_world::{AuctionBoard, ChatLog, Interpolator, WorldMirror};
use tokio::sync::{mpsc, watch};

use crate::{ClientConfig, ClientEvent, Persistence, PokelinkError};

/// The sync layer, as one object.
///
/// `I` is the game's creature storage, `P` its save-state provider.
pub struct Client<I: Inventory, P: Persistence> {
    pub(crate) config: ClientConfig,
    pub(crate) conn: ConnectionManager,
    pub(crate) world: WorldMirror,
    pub(crate) interpolator: Interpolator,
    pub(crate) chat: ChatLog,
    pub(crate) auction: AuctionBoard,
    pub(crate) trade: TradeEngine,
    pub(crate) battle: BattleEngine,
    pub(crate) inventory: I,
    pub(crate) persistence: P,
    pub(crate) game_time: Option<(u8, u8)>,
    /// Events produced outside `update`, returned by the next call.
    pub(crate) pending: Vec<ClientEvent>,
}

impl<I: Inventory, P: Persistence> Client<I, P> {
    pub fn new(config: ClientConfig, inventory: I, persistence: P) -> Self {
        let config = config.validated();
        Self {
            conn: ConnectionManager::new(config.connection.clone()),
            world: WorldMirror::new(),
            interpolator: Interpolator::new(config.world.interpolation.clone()),
            chat: ChatLog::new(config.world.chat_capacity),
            auction: AuctionBoard::new(),
            trade: TradeEngine::new(config.trade.clone()),
            battle: BattleEngine::new(config.battle.clone()),
            inventory,
            persistence,
            game_time: None,
            pending: Vec::new(),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Connects to the configured server. `false` on refusal, timeout, or
    /// rejection; the reason is in [`Self::last_error`].
    pub async fn connect(&mut self, username: &str, password: &str) -> bool {
        self.try_connect(Credentials::new(username, password))
            .await
            .is_ok()
    }

    /// Connects to the configured server and logs in.
    ///
    /// # Errors
    /// Whatever [`ConnectionManager::try_connect`] reports, wrapped.
    pub async fn try_connect(&mut self, credentials: Credentials) -> Result<PlayerId, PokelinkError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        let client_id = self.conn.try_connect(&host, port, credentials).await?;
        self.set_client_id(Some(client_id));
        Ok(client_id)
    }

    /// Ends the session, flushing the account snapshot first. Idempotent.
    pub fn disconnect(&mut self, reason: &str) {
        let snapshot = if self.conn.is_connected() {
            self.persistence.snapshot()
        } else {
            None
        };
        let was_live = self.conn.session().is_some();
        self.conn.disconnect(reason, snapshot);
        self.clear_session_state();
        if was_live {
            self.pending.push(ClientEvent::Disconnected {
                reason: reason.to_owned(),
            });
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn client_id(&self) -> Option<PlayerId> {
        self.conn.client_id()
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.conn.last_error()
    }

    /// Liveness of the connection; flips to `false` on disconnect.
    pub fn liveness(&self) -> watch::Receiver<bool> {
        self.conn.subscribe()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.conn
    }

    // -----------------------------------------------------------------------
    // Frame tick
    // -----------------------------------------------------------------------

    /// Runs one frame: routes every queued message in receipt order,
    /// checks trade and battle deadlines, and advances interpolation by
    /// `elapsed`. Never blocks.
    pub fn update(&mut self, elapsed: Duration) -> Vec<ClientEvent> {
        // Stops by itself once a handler or a socket fault disconnects.
        while let Some(entry) = self.conn.try_next() {
            self.dispatch(entry);
        }

        let now = Instant::now();
        let out = self.trade.poll(&mut self.inventory, now);
        self.send_all(out);
        let out = self.battle.poll(now);
        self.send_all(out);

        self.interpolator.advance(elapsed);
        self.collect_engine_events();
        std::mem::take(&mut self.pending)
    }

    // -----------------------------------------------------------------------
    // World actions
    // -----------------------------------------------------------------------

    pub fn send_position(&mut self, position: Position) {
        self.world.set_local_map(position.map_id);
        self.conn.send(&ClientMessage::PositionUpdate(position));
    }

    pub fn send_follower(&mut self, follower: Option<FollowerDescriptor>) {
        self.conn.send(&ClientMessage::FollowerUpdate { follower });
    }

    pub fn send_chat(&mut self, text: impl Into<String>, channel: ChatChannel) {
        self.conn.send(&ClientMessage::Chat {
            text: text.into(),
            channel,
        });
    }

    // -----------------------------------------------------------------------
    // Trade actions
    // -----------------------------------------------------------------------

    /// Offers `uid` to `partner`.
    pub fn trade_offer(
        &mut self,
        partner: PlayerId,
        partner_name: impl Into<String>,
        uid: &CreatureUid,
    ) -> Result<(), PokelinkError> {
        self.ensure_connected()?;
        let out = self
            .trade
            .initiate(&mut self.inventory, partner, partner_name, uid)?;
        self.send_all(out);
        Ok(())
    }

    /// Picks our creature for the current trade (offer or counter-offer).
    pub fn trade_select(&mut self, uid: &CreatureUid) -> Result<(), PokelinkError> {
        let out = self.trade.select(&mut self.inventory, uid)?;
        self.send_all(out);
        Ok(())
    }

    pub fn trade_confirm(&mut self) -> Result<(), PokelinkError> {
        let out = self.trade.confirm()?;
        self.send_all(out);
        Ok(())
    }

    /// Declines the current trade. No-op without one.
    pub fn trade_decline(&mut self, reason: TradeDeclineReason) {
        let out = self.trade.decline(&mut self.inventory, reason);
        self.send_all(out);
    }

    // -----------------------------------------------------------------------
    // Battle actions
    // -----------------------------------------------------------------------

    pub fn battle_request(
        &mut self,
        target: PlayerId,
        target_name: impl Into<String>,
        format: BattleFormat,
        party: Vec<CreatureDescriptor>,
    ) -> Result<(), PokelinkError> {
        self.ensure_connected()?;
        let out = self.battle.request(target, target_name, format, party)?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_accept(&mut self, party: Vec<CreatureDescriptor>) -> Result<(), PokelinkError> {
        let out = self.battle.accept(party)?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_decline(&mut self, reason: BattleDeclineReason) -> Result<(), PokelinkError> {
        let out = self.battle.decline_request(reason)?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_cancel(&mut self) {
        let out = self.battle.cancel();
        self.send_all(out);
    }

    pub fn battle_submit(&mut self, choice: TurnChoice) -> Result<(), PokelinkError> {
        let out = self.battle.submit_choice(choice)?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_switch(&mut self, party_index: u8) -> Result<(), PokelinkError> {
        let out = self.battle.send_switch(party_index)?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_forfeit(&mut self) -> Result<(), PokelinkError> {
        let out = self.battle.forfeit()?;
        self.send_all(out);
        Ok(())
    }

    pub fn battle_finish(&mut self, result: BattleResult) -> Result<(), PokelinkError> {
        let out = self.battle.finish(result)?;
        self.send_all(out);
        Ok(())
    }

    /// Opponent turn activity, for [`await_turn_signal`](pokelink_battle::await_turn_signal).
    pub fn battle_signals(&mut self) -> mpsc::UnboundedReceiver<TurnSignal> {
        self.battle.subscribe()
    }

    // -----------------------------------------------------------------------
    // Auction actions
    // -----------------------------------------------------------------------

    pub fn auction_list(&mut self, creature: CreatureDescriptor, price: u32) {
        self.conn.send(&ClientMessage::AuctionList { creature, price });
    }

    pub fn auction_browse(&mut self, page: u32) {
        self.conn.send(&ClientMessage::AuctionBrowse { page });
    }

    pub fn auction_buy(&mut self, listing_id: u64) {
        self.conn.send(&ClientMessage::AuctionBuy { listing_id });
    }

    pub fn auction_cancel(&mut self, listing_id: u64) {
        self.conn.send(&ClientMessage::AuctionCancel { listing_id });
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldMirror {
        &self.world
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn auction(&self) -> &AuctionBoard {
        &self.auction
    }

    pub fn trade(&self) -> &TradeEngine {
        &self.trade
    }

    pub fn battle(&self) -> &BattleEngine {
        &self.battle
    }

    /// For the RNG and reconciliation during a turn.
    pub fn battle_mut(&mut self) -> &mut BattleEngine {
        &mut self.battle
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut I {
        &mut self.inventory
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// In-game clock as last set by the server, `(hour, minute)`.
    pub fn game_time(&self) -> Option<(u8, u8)> {
        self.game_time
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    pub(crate) fn send_all(&mut self, messages: Vec<ClientMessage>) {
        for msg in &messages {
            self.conn.send(msg);
        }
    }

    pub(crate) fn set_client_id(&mut self, id: Option<PlayerId>) {
        self.world.set_local_id(id);
        self.trade.set_client_id(id);
        self.battle.set_client_id(id);
    }

    /// Drops everything tied to the session. The connection must already
    /// be down.
    pub(crate) fn clear_session_state(&mut self) {
        self.trade.reset(&mut self.inventory);
        self.battle.reset();
        self.world.clear();
        self.interpolator.clear();
        self.auction.clear();
        self.set_client_id(None);
        self.collect_engine_events();
    }

    fn collect_engine_events(&mut self) {
        self.pending
            .extend(self.trade.drain_events().into_iter().map(ClientEvent::Trade));
        self.pending
            .extend(self.battle.drain_events().into_iter().map(ClientEvent::Battle));
    }

    fn ensure_connected(&self) -> Result<(), PokelinkError> {
        if self.conn.is_connected() {
            Ok(())
        } else {
            Err(PokelinkError::NotConnected)
        }
    }
}

impl<I: Inventory, P: Persistence> Drop for Client<I, P> {
    fn drop(&mut self) {
        if self.conn.session().is_some() {
            self.disconnect("client dropped");
        }
    }
}
