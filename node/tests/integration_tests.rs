//! End-to-end tests: a real node on an ephemeral port, driven by a
//! WebSocket client, with the clock and dispatcher swapped for nullables.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use selection_node::{NodeConfig, NodeError, SelectionNode};
use selection_nullables::{NullClock, NullDispatcher};
use selection_types::VoteCode;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    node: SelectionNode,
    addr: SocketAddr,
    clock: Arc<NullClock>,
    dispatcher: Arc<NullDispatcher>,
}

async fn start_node() -> Harness {
    start_node_with(NullDispatcher::new()).await
}

async fn start_node_with(dispatcher: NullDispatcher) -> Harness {
    let config = NodeConfig {
        bind_address: "127.0.0.1".into(),
        port: 0,
        tick_interval_ms: 20,
        ..NodeConfig::default()
    };
    let clock = Arc::new(NullClock::new(1_000));
    let dispatcher = Arc::new(dispatcher);
    let mut node =
        SelectionNode::with_collaborators(config, clock.clone(), dispatcher.clone()).unwrap();
    let addr = node.start().await.unwrap();
    Harness {
        node,
        addr,
        clock,
        dispatcher,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Client, json: serde_json::Value) {
    ws.send(Message::Text(json.to_string())).await.unwrap();
}

async fn recv(ws: &mut Client) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skip messages until one matches `pred`.
async fn recv_until(ws: &mut Client, pred: impl Fn(&serde_json::Value) -> bool) -> serde_json::Value {
    loop {
        let value = recv(ws).await;
        if pred(&value) {
            return value;
        }
    }
}

async fn subscribe(ws: &mut Client, topic: &str) {
    send(ws, serde_json::json!({"action": "subscribe", "topic": topic})).await;
    recv_until(ws, |v| v["type"] == "ack" && v["topic"] == topic).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscriber_gets_state_on_connect_and_after_votes() {
    let mut h = start_node().await;
    let mut ws = connect(h.addr).await;

    send(&mut ws, serde_json::json!({"action": "subscribe", "topic": "vote_update"})).await;
    assert_eq!(recv(&mut ws).await["type"], "ack");
    let initial = recv(&mut ws).await;
    assert_eq!(initial["topic"], "vote_update");
    assert_eq!(initial["data"]["total_voters"], 0);
    assert_eq!(initial["data"]["active"], true);

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "alice", "code": "k"})).await;
    let reply = recv_until(&mut ws, |v| v["type"] == "vote_result").await;
    assert_eq!(reply["accepted"], true);

    let update = recv_until(&mut ws, |v| v["data"]["total_voters"] == 1).await;
    assert_eq!(update["data"]["counts"]["k"], 1);
    assert_eq!(update["data"]["claimant"], "alice");

    h.node.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_codes_are_rejected_without_state_change() {
    let mut h = start_node().await;
    let mut ws = connect(h.addr).await;

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "bob", "code": "q"})).await;
    assert_eq!(recv(&mut ws).await["accepted"], false);
    assert_eq!(h.node.service.snapshot().await.total_voters, 0);

    h.node.stop().await.unwrap();
}

#[tokio::test]
async fn expired_round_dispatches_winner_and_broadcasts_resolution() {
    let mut h = start_node().await;
    let mut ws = connect(h.addr).await;
    subscribe(&mut ws, "resolution").await;

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "alice", "code": "k"})).await;
    recv_until(&mut ws, |v| v["type"] == "vote_result").await;

    h.clock.advance(61);

    // A unanimous round runs for the base duration: 60 ticks of 20ms.
    let event = recv_until(&mut ws, |v| v["topic"] == "resolution").await;
    assert_eq!(event["data"]["resolution"]["resolved_at"], 1_061_000);
    assert_eq!(event["data"]["resolution"]["winner"], "k");
    assert_eq!(event["data"]["resolution"]["claimant"], "alice");
    assert_eq!(event["data"]["resolution"]["forced"], false);
    assert_eq!(h.dispatcher.dispatched_codes(), vec![VoteCode::new('k')]);

    let snapshot = h.node.service.snapshot().await;
    assert_eq!(snapshot.round, 2);
    assert_eq!(snapshot.total_voters, 0);

    h.node.stop().await.unwrap();
}

#[tokio::test]
async fn admin_commands_drive_the_round() {
    let mut h = start_node().await;
    let mut ws = connect(h.addr).await;
    subscribe(&mut ws, "action_log").await;

    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "add_vote", "code": "k"}}),
    )
    .await;
    let reply = recv_until(&mut ws, |v| v["type"] == "admin_result").await;
    assert_eq!(reply["ok"], true);
    let logged = recv_until(&mut ws, |v| v["data"]["action"] == "Admin vote added").await;
    assert_eq!(logged["data"]["details"], "admin_1: k");

    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "force_resolve", "code": "k"}}),
    )
    .await;
    let reply = recv_until(&mut ws, |v| v["type"] == "admin_result").await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["command"], "force_resolve");
    assert_eq!(reply["message"], "Round 1 resolved to k");
    let executed = recv_until(&mut ws, |v| v["data"]["action"] == "Executed").await;
    assert_eq!(executed["data"]["details"], "Kill");
    assert_eq!(h.dispatcher.dispatched_codes(), vec![VoteCode::new('k')]);

    send(&mut ws, serde_json::json!({"action": "admin", "command": {"type": "get_log"}})).await;
    let reply = recv_until(&mut ws, |v| v["type"] == "admin_result").await;
    let lines = reply["log"].as_array().unwrap();
    assert!(!lines.is_empty());
    assert!(lines[0].as_str().unwrap().contains("Executed"));

    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "remove_vote", "code": "k"}}),
    )
    .await;
    let reply = recv_until(&mut ws, |v| v["type"] == "admin_result").await;
    assert_eq!(reply["ok"], false);

    h.node.stop().await.unwrap();
}

#[tokio::test]
async fn slow_dispatch_leaves_intake_and_countdown_running() {
    let dispatcher = NullDispatcher::new();
    dispatcher.set_delay(Duration::from_millis(1_000));
    let mut h = start_node_with(dispatcher).await;
    let mut ws = connect(h.addr).await;

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "alice", "code": "k"})).await;
    recv_until(&mut ws, |v| v["type"] == "vote_result").await;
    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "force_resolve", "code": "k"}}),
    )
    .await;
    recv_until(&mut ws, |v| v["type"] == "admin_result").await;

    // The dispatcher is still blocked; votes must not queue behind it.
    let started = tokio::time::Instant::now();
    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "bob", "code": "l"})).await;
    let reply = recv_until(&mut ws, |v| v["type"] == "vote_result").await;
    assert_eq!(reply["accepted"], true);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(h.dispatcher.dispatched().is_empty());

    // Ten ticks of 20ms: the new countdown moves steadily, no catch-up burst.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = h.node.service.snapshot().await;
    assert_eq!(snapshot.round, 2);
    let remaining = snapshot.remaining.unwrap();
    assert!((40..60).contains(&remaining), "remaining {remaining}");

    h.node.stop().await.unwrap();
    assert_eq!(h.dispatcher.dispatched_codes(), vec![VoteCode::new('k')]);
}

#[tokio::test]
async fn paused_timer_does_not_expire() {
    let mut h = start_node().await;
    let mut ws = connect(h.addr).await;

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "alice", "code": "k"})).await;
    recv_until(&mut ws, |v| v["type"] == "vote_result").await;
    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "pause_timer"}}),
    )
    .await;
    recv_until(&mut ws, |v| v["type"] == "admin_result").await;

    // Well past 60 ticks.
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let snapshot = h.node.service.snapshot().await;
    assert!(snapshot.paused);
    assert_eq!(snapshot.round, 1);
    assert!(h.dispatcher.dispatched().is_empty());

    h.node.stop().await.unwrap();
}

#[tokio::test]
async fn stop_before_start_is_an_error() {
    let mut node = SelectionNode::with_collaborators(
        NodeConfig::default(),
        Arc::new(NullClock::new(0)),
        Arc::new(NullDispatcher::new()),
    )
    .unwrap();
    assert!(matches!(node.stop().await, Err(NodeError::NotStarted)));
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut h = start_node().await;
    assert!(h.node.start().await.is_err());
    h.node.stop().await.unwrap();
}
