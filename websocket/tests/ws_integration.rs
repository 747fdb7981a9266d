use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use selection_actions::ActionRegistry;
use selection_types::{Timestamp, VoteCounts};
use selection_voting::{Broadcaster, LogEntry, RoundPhase, RoundSnapshot};
use selection_websocket::{AdminCommand, AdminReply, InboundCommand, WebSocketServer, WsState};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Answers engine commands the way a trivial engine would: only `k` votes
/// are accepted, admin commands always succeed.
fn spawn_fake_engine(mut rx: mpsc::Receiver<InboundCommand>) {
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                InboundCommand::CastVote { code, reply, .. } => {
                    let _ = reply.send(code.eq_ignore_ascii_case("k"));
                }
                InboundCommand::GetActions { reply } => {
                    let _ = reply.send(ActionRegistry::with_defaults().all().to_vec());
                }
                InboundCommand::Admin { command, reply } => {
                    let answer = match command {
                        AdminCommand::GetLog => {
                            AdminReply::ok("log").with_log(vec!["00:00:01 - Votes reset".into()])
                        }
                        other => AdminReply::ok(other.name()),
                    };
                    let _ = reply.send(answer);
                }
            }
        }
    });
}

async fn start(registry: Option<prometheus::Registry>) -> (SocketAddr, Arc<WsState>) {
    let (tx, rx) = mpsc::channel(16);
    spawn_fake_engine(rx);

    let mut state = WsState::new(16, tx);
    if let Some(registry) = registry {
        state = state.with_metrics(registry);
    }
    let state = Arc::new(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = WebSocketServer::new("127.0.0.1", addr.port(), state.clone());
    tokio::spawn(async move {
        let _ = server.serve(listener, std::future::pending()).await;
    });
    (addr, state)
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

fn snapshot(round: u64) -> RoundSnapshot {
    RoundSnapshot {
        counts: VoteCounts::new(),
        total_voters: 0,
        claimant: None,
        active: true,
        phase: RoundPhase::Idle,
        remaining: None,
        limit: None,
        paused: false,
        round,
        timestamp: Timestamp::from_secs(1),
    }
}

#[tokio::test]
async fn ping_pong_and_invalid_message() {
    let (addr, _state) = start(None).await;
    let mut ws = connect(addr).await;

    send(&mut ws, serde_json::json!({"action": "ping"})).await;
    assert_eq!(recv(&mut ws).await["type"], "pong");

    ws.send(Message::Text("not json".into())).await.unwrap();
    let reply = recv(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().starts_with("Invalid message"));
}

#[tokio::test]
async fn subscriber_receives_published_state() {
    let (addr, state) = start(None).await;
    let mut ws = connect(addr).await;

    send(&mut ws, serde_json::json!({"action": "subscribe", "topic": "vote_update"})).await;
    let ack = recv(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["topic"], "vote_update");

    state.publish_state(&snapshot(4));
    let event = recv(&mut ws).await;
    assert_eq!(event["topic"], "vote_update");
    assert_eq!(event["data"]["round"], 4);
}

#[tokio::test]
async fn new_subscriber_gets_latest_state() {
    let (addr, state) = start(None).await;
    state.publish_state(&snapshot(9));

    let mut ws = connect(addr).await;
    send(&mut ws, serde_json::json!({"action": "subscribe", "topic": "vote_update"})).await;
    assert_eq!(recv(&mut ws).await["type"], "ack");
    assert_eq!(recv(&mut ws).await["data"]["round"], 9);
}

#[tokio::test]
async fn unsubscribe_without_subscription_is_an_error() {
    let (addr, state) = start(None).await;
    let mut ws = connect(addr).await;

    send(&mut ws, serde_json::json!({"action": "subscribe", "topic": "action_log"})).await;
    recv(&mut ws).await;
    state.publish_log(&LogEntry::new(Timestamp::from_secs(2), "Votes reset", ""));
    assert_eq!(recv(&mut ws).await["data"]["line"], "00:00:02 - Votes reset");

    send(&mut ws, serde_json::json!({"action": "unsubscribe", "topic": "action_log"})).await;
    assert_eq!(recv(&mut ws).await["type"], "ack");
    send(&mut ws, serde_json::json!({"action": "unsubscribe", "topic": "action_log"})).await;
    assert_eq!(recv(&mut ws).await["type"], "error");
}

#[tokio::test]
async fn votes_and_actions_round_trip_through_engine() {
    let (addr, _state) = start(None).await;
    let mut ws = connect(addr).await;

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "alice", "code": "K"})).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["type"], "vote_result");
    assert_eq!(reply["accepted"], true);

    send(&mut ws, serde_json::json!({"action": "cast_vote", "voter": "bob", "code": "q"})).await;
    assert_eq!(recv(&mut ws).await["accepted"], false);

    send(&mut ws, serde_json::json!({"action": "get_actions"})).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["type"], "actions");
    assert_eq!(reply["actions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn admin_commands_get_results() {
    let (addr, _state) = start(None).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        serde_json::json!({"action": "admin", "command": {"type": "add_vote", "code": "k"}}),
    )
    .await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["type"], "admin_result");
    assert_eq!(reply["command"], "add_vote");
    assert_eq!(reply["ok"], true);

    send(&mut ws, serde_json::json!({"action": "admin", "command": {"type": "get_log"}})).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["log"][0], "00:00:01 - Votes reset");
}

#[tokio::test]
async fn metrics_route_serves_registry() {
    let registry = prometheus::Registry::new();
    let counter = prometheus::IntCounter::new("selection_test_total", "test counter").unwrap();
    registry.register(Box::new(counter.clone())).unwrap();
    counter.inc();

    let (addr, _state) = start(Some(registry)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    assert!(body.starts_with("HTTP/1.1 200"));
    assert!(body.contains("selection_test_total 1"));
}
