//! End-to-end tests: a `Client` against a scripted loopback server.
//!
//! Each test accepts one connection, answers the auth message, and then
//! alternates between writing server messages and running client frames.

use std::time::Duration;

use pokelink::{Client, ClientConfig, ClientEvent, MemoryPersistence};
use pokelink_battle::{BattleEvent, BattlePhase, EndReason};
use pokelink_protocol::{
    AccountSnapshot, BattleResult, CreatureDescriptor, CreatureUid, MapId, PlayerId,
    ServerErrorCode, TradeDeclineReason,
};
use pokelink_session::{ConnectionConfig, Credentials};
use pokelink_trade::{Inventory, PartyInventory, TradeEvent, TradeState};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type TestClient = Client<PartyInventory, MemoryPersistence>;

struct ServerConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ServerConn {
    async fn write_json(&mut self, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.expect("write");
    }

    /// Reads client lines until one of type `kind` arrives, skipping
    /// heartbeats.
    async fn expect(&mut self, kind: &str) -> Value {
        loop {
            let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
                .await
                .unwrap_or_else(|_| panic!("no {kind} within 2s"))
                .expect("read line")
                .unwrap_or_else(|| panic!("client closed before sending {kind}"));
            let value: Value = serde_json::from_str(&line).expect("client sent valid json");
            if value["type"] == "heartbeat" {
                continue;
            }
            assert_eq!(value["type"], kind, "unexpected message: {value}");
            return value;
        }
    }

    /// Whether the client closed its side.
    async fn closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(Duration::from_secs(2), self.lines.next_line()).await {
                Ok(Ok(None)) | Ok(Err(_)) => return true,
                Ok(Ok(Some(_))) => continue,
                Err(_) => return false,
            }
        }
    }
}

fn creature(uid: &str, species: &str) -> CreatureDescriptor {
    CreatureDescriptor::new(uid, species, 15)
}

/// Connects a client with the given inventory as player 1 ("Ash"). The
/// auth reply carries `snapshot` when given.
async fn connect(inventory: PartyInventory, snapshot: Option<Value>) -> (TestClient, ServerConn) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let (read, writer) = socket.into_split();
        let mut conn = ServerConn {
            lines: BufReader::new(read).lines(),
            writer,
        };
        let auth = conn.expect("auth").await;
        assert_eq!(auth["data"]["username"], "Ash");
        conn.write_json(json!({
            "type": "auth_success",
            "data": { "client_id": 1, "username": "Ash", "snapshot": snapshot }
        }))
        .await;
        conn
    });

    let config = ClientConfig {
        port,
        connection: ConnectionConfig {
            connect_timeout_ms: 1_000,
            ..ConnectionConfig::default()
        },
        ..ClientConfig::default()
    };
    let mut client = Client::new(config, inventory, MemoryPersistence::default());
    let id = client
        .try_connect(Credentials::new("Ash", "pikachu"))
        .await
        .expect("should connect");
    assert_eq!(id, PlayerId(1));
    let conn = server.await.expect("server task");
    (client, conn)
}

/// Runs frames until `done` holds for the collected events, or 2s pass.
async fn pump(client: &mut TestClient, done: impl Fn(&[ClientEvent]) -> bool) -> Vec<ClientEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut events = Vec::new();
    loop {
        events.extend(client.update(Duration::from_millis(16)));
        if done(&events) {
            return events;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s, events: {events:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn player(id: u64, name: &str, map: u32, x: i32, y: i32) -> Value {
    json!({
        "id": id, "username": name,
        "map_id": map, "x": x, "y": y, "real_x": x * 128, "real_y": y * 128
    })
}

// ---------------------------------------------------------------------------
// Session and world
// ---------------------------------------------------------------------------

/// Writes `time_set` as a sentinel and runs frames until it is routed, so
/// everything written before it has been handled.
async fn settle(client: &mut TestClient, server: &mut ServerConn) -> Vec<ClientEvent> {
    server
        .write_json(json!({ "type": "time_set", "data": { "hour": 20, "minute": 30 } }))
        .await;
    pump(client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::TimeSet { .. }))
    })
    .await
}

#[tokio::test]
async fn test_update_after_connect_restores_snapshot_and_mirrors_roster() {
    let (mut client, mut server) = connect(
        PartyInventory::new(6),
        Some(json!({ "money": 3000, "badges": 2 })),
    )
    .await;
    server
        .write_json(json!({
            "type": "player_list",
            "data": { "players": [player(1, "Ash", 1, 0, 0), player(2, "Misty", 1, 3, 4)] }
        }))
        .await;

    let events = settle(&mut client, &mut server).await;

    assert!(matches!(
        events.first(),
        Some(ClientEvent::Connected { client_id: PlayerId(1), .. })
    ));
    assert_eq!(
        client.persistence().current,
        Some(AccountSnapshot(json!({ "money": 3000, "badges": 2 })))
    );
    assert_eq!(client.persistence().restores, 1);
    // The local player is never mirrored.
    assert_eq!(client.world().len(), 1);
    assert_eq!(
        client.interpolator().rendered(PlayerId(2)),
        Some((384.0, 512.0))
    );
}

#[tokio::test]
async fn test_update_player_moved_sets_interpolation_target() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({
            "type": "player_list",
            "data": { "players": [player(1, "Ash", 1, 0, 0), player(2, "Misty", 1, 3, 4)] }
        }))
        .await;
    server
        .write_json(json!({
            "type": "player_moved",
            "data": { "id": 2, "map_id": 1, "x": 4, "y": 4, "real_x": 512, "real_y": 512 }
        }))
        .await;
    settle(&mut client, &mut server).await;

    let misty = client.world().get(PlayerId(2)).expect("misty mirrored");
    assert_eq!(misty.position.x, 4);
    let track = client.interpolator().track(PlayerId(2)).expect("tracked");
    assert_eq!(track.target_x, 512);
    // A one-tile step glides: the frame that routed it moved part way.
    assert!(track.rendered_x > 384.0 && track.rendered_x <= 512.0);
    assert_eq!(client.game_time(), Some((20, 30)));
}

#[tokio::test]
async fn test_update_ping_answers_pong() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({ "type": "ping", "data": { "nonce": 77 } }))
        .await;

    settle(&mut client, &mut server).await;

    let pong = server.expect("pong").await;
    assert_eq!(pong["data"]["nonce"], 77);
}

#[tokio::test]
async fn test_update_unknown_type_is_ignored() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({ "type": "weather_change", "data": { "rain": true } }))
        .await;
    server
        .write_json(json!({ "type": "admin_broadcast", "data": { "text": "restart at noon" } }))
        .await;

    let events = pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::Chat(_)))
    })
    .await;

    assert!(client.is_connected());
    assert_eq!(client.chat().latest().map(|l| l.text.as_str()), Some("restart at noon"));
    assert!(events.iter().any(|e| matches!(e, ClientEvent::Connected { .. })));
}

#[tokio::test]
async fn test_update_fatal_error_tears_session_down() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({
            "type": "error",
            "data": { "code": "duplicate_login", "message": "logged in elsewhere" }
        }))
        .await;

    let events = pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::Disconnected { .. }))
    })
    .await;

    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::ServerError { code: ServerErrorCode::DuplicateLogin, .. }
    )));
    assert!(!client.is_connected());
    assert_eq!(client.client_id(), None);
    assert_eq!(
        client.last_error().map(|e| e.message.as_str()),
        Some("logged in elsewhere")
    );
    server.expect("disconnect").await;
}

#[tokio::test]
async fn test_update_admin_give_adds_creature() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({
            "type": "admin_give",
            "data": { "creature": { "uid": "gift-1", "species": "eevee", "level": 5 } }
        }))
        .await;

    pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::CreatureReceived(_)))
    })
    .await;

    assert!(client.inventory().contains(&CreatureUid::from("gift-1")));
}

#[tokio::test]
async fn test_disconnect_flushes_snapshot_then_notice() {
    let (mut client, mut server) = connect(
        PartyInventory::new(6),
        Some(json!({ "money": 10 })),
    )
    .await;
    pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::Connected { .. }))
    })
    .await;

    client.disconnect("quit");
    client.disconnect("quit again");

    let save = server.expect("save_state").await;
    assert_eq!(save["data"]["snapshot"]["money"], 10);
    let bye = server.expect("disconnect").await;
    assert_eq!(bye["data"]["reason"], "quit");
    assert!(server.closed().await);

    let events = client.update(Duration::ZERO);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ClientEvent::Disconnected { .. }))
            .count(),
        1
    );
}

// ---------------------------------------------------------------------------
// Trade over the wire
// ---------------------------------------------------------------------------

fn trade_offer() -> Value {
    json!({
        "type": "trade_offer",
        "data": {
            "trade_id": "2_1700000000000_42",
            "from": 2,
            "username": "Misty",
            "creature": { "uid": "m-1", "species": "staryu", "level": 20 }
        }
    })
}

#[tokio::test]
async fn test_trade_offer_counter_and_execute() {
    let inventory = PartyInventory::with_creatures([creature("a-1", "pikachu")]);
    let (mut client, mut server) = connect(inventory, None).await;
    server.write_json(trade_offer()).await;

    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Trade(TradeEvent::OfferReceived { .. })))
    })
    .await;
    assert_eq!(client.trade().state(), Some(TradeState::WaitingForOffer));

    client.trade_select(&CreatureUid::from("a-1")).expect("counter-offer");
    let counter = server.expect("trade_counter_offer").await;
    assert_eq!(counter["data"]["target"], 2);
    assert_eq!(counter["data"]["creature"]["uid"], "a-1");
    assert!(client.inventory().is_locked(&CreatureUid::from("a-1")));

    server
        .write_json(json!({
            "type": "trade_confirm",
            "data": { "trade_id": "2_1700000000000_42", "from": 2 }
        }))
        .await;
    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Trade(TradeEvent::PartnerConfirmed { .. })))
    })
    .await;
    client.trade_confirm().expect("confirm");
    server.expect("trade_confirm").await;
    assert_eq!(client.trade().state(), Some(TradeState::Accepted));

    server
        .write_json(json!({
            "type": "trade_execute",
            "data": {
                "trade_id": "2_1700000000000_42",
                "give": "a-1",
                "receive": { "uid": "m-1", "species": "staryu", "level": 20 }
            }
        }))
        .await;
    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Trade(TradeEvent::Completed { .. })))
    })
    .await;

    server.expect("trade_complete").await;
    assert!(client.inventory().contains(&CreatureUid::from("m-1")));
    assert!(!client.inventory().contains(&CreatureUid::from("a-1")));
}

#[tokio::test]
async fn test_trade_connection_lost_restores_locked_creature() {
    let inventory = PartyInventory::with_creatures([creature("a-1", "pikachu")]);
    let (mut client, server) = connect(inventory, None).await;
    client
        .trade_offer(PlayerId(2), "Misty", &CreatureUid::from("a-1"))
        .expect("offer");
    assert_eq!(client.inventory().available().len(), 0);

    drop(server);
    let events = pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::Disconnected { .. }))
    })
    .await;

    assert_eq!(client.inventory().available().len(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Trade(TradeEvent::Declined {
            reason: TradeDeclineReason::Disconnected,
            ..
        })
    )));
    assert!(client.last_error().is_some());
}

// ---------------------------------------------------------------------------
// Battle over the wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_battle_opponent_disconnect_wins() {
    let party = vec![creature("a-1", "pikachu")];
    let (mut client, mut server) =
        connect(PartyInventory::with_creatures(party.clone()), None).await;

    server
        .write_json(json!({
            "type": "battle_request",
            "data": { "from": 2, "username": "Brock", "format": "single" }
        }))
        .await;
    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Battle(BattleEvent::RequestReceived { .. })))
    })
    .await;

    client.battle_accept(party).expect("accept");
    server.expect("battle_accept").await;

    server
        .write_json(json!({
            "type": "battle_party",
            "data": { "from": 2, "party": [{ "uid": "b-1", "species": "onix", "level": 14 }] }
        }))
        .await;
    server
        .write_json(json!({
            "type": "battle_start",
            "data": { "battle_id": 9, "opponent": 2, "is_host": false, "format": "single" }
        }))
        .await;
    server
        .write_json(json!({ "type": "battle_ready", "data": { "battle_id": 9 } }))
        .await;
    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Battle(BattleEvent::TurnStarted { turn: 1, .. })))
    })
    .await;
    server.expect("battle_ready").await;
    assert_eq!(client.battle().phase(), BattlePhase::Active);
    assert!(!client.battle().is_local_acting(1));

    server
        .write_json(json!({ "type": "battle_opponent_disconnected", "data": { "battle_id": 9 } }))
        .await;
    pump(&mut client, |events| {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Battle(BattleEvent::Ended { .. })))
    })
    .await;

    let end = server.expect("battle_end").await;
    assert_eq!(end["data"]["result"], "won");
    let outcome = client.battle().outcome().expect("outcome");
    assert_eq!(outcome.result, BattleResult::Won);
    assert_eq!(outcome.reason, EndReason::OpponentDisconnected);
}

#[tokio::test]
async fn test_teleport_changes_local_map() {
    let (mut client, mut server) = connect(PartyInventory::new(6), None).await;
    server
        .write_json(json!({ "type": "teleport", "data": { "map_id": 12, "x": 5, "y": 9 } }))
        .await;

    let events = pump(&mut client, |events| {
        events.iter().any(|e| matches!(e, ClientEvent::Teleport { .. }))
    })
    .await;

    assert!(events.contains(&ClientEvent::Teleport {
        map_id: MapId(12),
        x: 5,
        y: 9
    }));
    assert_eq!(client.world().local_map(), Some(MapId(12)));
}

#[tokio::test]
async fn test_trade_offer_without_connection_fails() {
    let mut client: TestClient = Client::new(
        ClientConfig::default(),
        PartyInventory::with_creatures([creature("a-1", "pikachu")]),
        MemoryPersistence::default(),
    );
    let err = client
        .trade_offer(PlayerId(2), "Misty", &CreatureUid::from("a-1"))
        .unwrap_err();
    assert!(matches!(err, pokelink::PokelinkError::NotConnected));
    assert_eq!(client.inventory().available().len(), 1);
}
