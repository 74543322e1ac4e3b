//! Dispatch router: one inbound entry at a time, in receipt order.
//!
//! Runs on the main loop inside [`Client::update`]. Handlers only touch
//! in-memory state and queue outbound messages, so nothing here blocks.
//! Unknown message types are logged and skipped.

use pokelink_protocol::{ClientMessage, ServerMessage};
use pokelink_session::Inbound;
use pokelink_trade::Inventory;
use pokelink_world::{AuctionOutcome, ChatLine};

use crate::{Client, ClientEvent, Persistence};

impl<I: Inventory, P: Persistence> Client<I, P> {
    pub(crate) fn dispatch(&mut self, entry: Inbound) {
        match entry {
            Inbound::Message(msg) => self.route(msg),
            Inbound::Closed { reason } => {
                // The manager has already torn the socket down.
                self.clear_session_state();
                self.pending.push(ClientEvent::Disconnected { reason });
            }
        }
    }

    fn route(&mut self, msg: ServerMessage) {
        tracing::trace!(kind = msg.kind(), "routing message");
        match msg {
            // -- Connection lifecycle --
            ServerMessage::AuthSuccess {
                client_id,
                username,
                snapshot,
            } => {
                self.set_client_id(Some(client_id));
                if let Some(snapshot) = snapshot {
                    self.persistence.restore(snapshot);
                }
                self.pending.push(ClientEvent::Connected {
                    client_id,
                    username,
                });
            }
            ServerMessage::Error { code, message } => {
                tracing::warn!(?code, %message, "server error");
                self.conn.record_error(message.clone());
                self.pending.push(ClientEvent::ServerError {
                    code,
                    message: message.clone(),
                });
                if code.is_fatal() {
                    self.disconnect(&message);
                }
            }
            ServerMessage::Ping { nonce } => {
                self.conn.send(&ClientMessage::Pong { nonce });
            }

            // -- World --
            ServerMessage::PlayerList { players } => {
                for id in self.world.replace_roster(players) {
                    self.interpolator.remove(id);
                }
                for player in self.world.iter() {
                    self.interpolator.set_target(player.id, &player.position);
                }
            }
            ServerMessage::PlayerJoined(snapshot) => {
                let id = snapshot.id;
                let position = snapshot.position;
                if self.world.upsert(snapshot) {
                    self.interpolator.set_target(id, &position);
                    self.pending.push(ClientEvent::PlayerJoined(id));
                }
            }
            ServerMessage::PlayerLeft { id } => {
                self.world.remove(id);
                self.interpolator.remove(id);
                self.trade.on_partner_left(&mut self.inventory, id);
                let out = self.battle.on_player_left(id);
                self.send_all(out);
                self.pending.push(ClientEvent::PlayerLeft(id));
            }
            ServerMessage::PlayerMoved(movement) => {
                if let Some(player) = self.world.apply_movement(&movement) {
                    self.interpolator.set_target(player.id, &player.position);
                }
            }
            ServerMessage::FollowerUpdate { id, follower } => {
                self.world.set_follower(id, follower);
            }
            ServerMessage::ActivePlayers { map_id, ids } => {
                for id in self.world.apply_active_set(map_id, &ids) {
                    self.interpolator.remove(id);
                }
            }
            ServerMessage::Chat {
                from,
                username,
                text,
                channel,
            } => {
                let line = ChatLine {
                    from,
                    username,
                    text,
                    channel,
                };
                self.chat.push(line.clone());
                self.pending.push(ClientEvent::Chat(line));
            }

            // -- Battle --
            ServerMessage::BattleRequest {
                from,
                username,
                format,
            } => {
                let out = self.battle.on_request(from, username, format);
                self.send_all(out);
            }
            ServerMessage::BattleAccept { from, party } => {
                let out = self.battle.on_accept(from, party);
                self.send_all(out);
            }
            ServerMessage::BattleDecline { from, reason } => {
                self.battle.on_decline(from, reason);
            }
            ServerMessage::BattlePartyRequest { from } => {
                let out = self.battle.on_party_request(from);
                self.send_all(out);
            }
            ServerMessage::BattleParty { from, party } => {
                self.battle.on_party(from, party);
            }
            ServerMessage::BattleStart {
                battle_id,
                opponent,
                is_host,
                format,
            } => {
                let out = self.battle.on_start(battle_id, opponent, is_host, format);
                self.send_all(out);
            }
            ServerMessage::BattleReady { battle_id } => {
                self.battle.on_ready(battle_id);
            }
            ServerMessage::BattleChoice { battle_id, choice } => {
                self.battle.on_choice(battle_id, choice);
            }
            ServerMessage::BattleSwitch {
                battle_id,
                turn,
                party_index,
            } => {
                self.battle.on_switch(battle_id, turn, party_index);
            }
            ServerMessage::BattleForfeit { battle_id } => {
                let out = self.battle.on_forfeit(battle_id);
                self.send_all(out);
            }
            ServerMessage::BattleOpponentDisconnected { battle_id } => {
                let out = self.battle.on_opponent_disconnected(battle_id);
                self.send_all(out);
            }

            // -- Trade --
            ServerMessage::TradeOffer {
                trade_id,
                from,
                username,
                creature,
            } => {
                let out = self
                    .trade
                    .on_offer(&self.inventory, trade_id, from, username, creature);
                self.send_all(out);
            }
            ServerMessage::TradeCounterOffer {
                trade_id,
                from,
                creature,
            } => {
                self.trade.on_counter_offer(&trade_id, from, creature);
            }
            ServerMessage::TradeConfirm { trade_id, from } => {
                self.trade.on_confirm(&trade_id, from);
            }
            ServerMessage::TradeDecline {
                trade_id,
                from,
                reason,
            } => {
                self.trade
                    .on_decline(&mut self.inventory, &trade_id, from, reason);
            }
            ServerMessage::TradeExecute {
                trade_id,
                give,
                receive,
            } => {
                let out = self
                    .trade
                    .on_execute(&mut self.inventory, &trade_id, &give, receive);
                self.send_all(out);
            }

            // -- Auction house --
            ServerMessage::AuctionListings { page, listings } => {
                self.auction.apply_listings(page, listings);
                self.pending.push(ClientEvent::AuctionListings { page });
            }
            ServerMessage::AuctionResult {
                action,
                success,
                listing_id,
                message,
            } => {
                let outcome = AuctionOutcome {
                    action,
                    success,
                    listing_id,
                    message,
                };
                self.auction.apply_outcome(outcome.clone());
                self.pending.push(ClientEvent::AuctionResult(outcome));
            }

            // -- Admin / environment --
            ServerMessage::AdminKick { reason } => {
                tracing::warn!(%reason, "kicked by admin");
                self.conn.record_error(format!("kicked: {reason}"));
                self.pending.push(ClientEvent::Kicked {
                    reason: reason.clone(),
                });
                self.disconnect(&format!("kicked: {reason}"));
            }
            ServerMessage::AdminBroadcast { text } => {
                let line = ChatLine::system(text);
                self.chat.push(line.clone());
                self.pending.push(ClientEvent::Chat(line));
            }
            ServerMessage::AdminGive { creature } => {
                match self.inventory.add(creature.clone()) {
                    Ok(()) => self.pending.push(ClientEvent::CreatureReceived(creature)),
                    Err(e) => {
                        tracing::warn!(uid = %creature.uid, error = %e, "could not store given creature");
                    }
                }
            }
            ServerMessage::Teleport { map_id, x, y } => {
                self.world.set_local_map(map_id);
                self.pending.push(ClientEvent::Teleport { map_id, x, y });
            }
            ServerMessage::TimeSet { hour, minute } => {
                self.game_time = Some((hour, minute));
                self.pending.push(ClientEvent::TimeSet { hour, minute });
            }

            ServerMessage::Unknown { kind } => {
                tracing::debug!(%kind, "ignoring unknown message type");
            }
        }
    }
}
