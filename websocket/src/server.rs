//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws`. Clients subscribe to topics
//! (vote updates, resolutions, the action log) and send votes and admin
//! commands. Events are delivered via one broadcast channel per topic; votes
//! and commands travel to the engine over an mpsc channel and are answered
//! through a oneshot.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use selection_types::Timestamp;
use selection_voting::{Broadcaster, LogEntry, ResolutionReport, RoundSnapshot};

use crate::command::{AdminReply, InboundCommand};
use crate::error::WsError;
use crate::subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage, SubscriptionTopic};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared state for the WebSocket server: one broadcast channel per topic,
/// the channel to the engine, and the last published round state.
pub struct WsState {
    /// Broadcast channel for round state updates.
    pub vote_update_tx: broadcast::Sender<String>,
    /// Broadcast channel for resolutions.
    pub resolution_tx: broadcast::Sender<String>,
    /// Broadcast channel for action log lines.
    pub action_log_tx: broadcast::Sender<String>,
    commands: mpsc::Sender<InboundCommand>,
    latest_state: RwLock<Option<String>>,
    metrics: Option<Registry>,
}

impl WsState {
    /// Create a new `WsState` with the given channel capacity for each topic.
    pub fn new(channel_capacity: usize, commands: mpsc::Sender<InboundCommand>) -> Self {
        let (vote_update_tx, _) = broadcast::channel(channel_capacity);
        let (resolution_tx, _) = broadcast::channel(channel_capacity);
        let (action_log_tx, _) = broadcast::channel(channel_capacity);

        Self {
            vote_update_tx,
            resolution_tx,
            action_log_tx,
            commands,
            latest_state: RwLock::new(None),
            metrics: None,
        }
    }

    /// Serve `registry` on `/metrics`.
    pub fn with_metrics(mut self, registry: Registry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Get the broadcast sender for a given topic.
    pub fn sender_for(&self, topic: &SubscriptionTopic) -> &broadcast::Sender<String> {
        match topic {
            SubscriptionTopic::VoteUpdate => &self.vote_update_tx,
            SubscriptionTopic::Resolution => &self.resolution_tx,
            SubscriptionTopic::ActionLog => &self.action_log_tx,
        }
    }

    /// The most recent `vote_update` event, replayed to new subscribers.
    pub fn latest_state(&self) -> Option<String> {
        self.latest_state.read().ok().and_then(|s| s.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> InboundCommand,
    ) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(make(reply_tx)).await.is_err() {
            warn!("engine command channel closed");
            return None;
        }
        reply_rx.await.ok()
    }
}

fn envelope<T: Serialize>(topic: SubscriptionTopic, data: &T, at: Timestamp) -> String {
    serde_json::json!({
        "topic": topic,
        "data": data,
        "timestamp": at.as_millis(),
    })
    .to_string()
}

impl Broadcaster for WsState {
    fn publish_state(&self, snapshot: &RoundSnapshot) {
        let event = envelope(SubscriptionTopic::VoteUpdate, snapshot, snapshot.timestamp);
        if let Ok(mut latest) = self.latest_state.write() {
            *latest = Some(event.clone());
        }
        let _ = self.vote_update_tx.send(event);
    }

    fn publish_resolution(&self, report: &ResolutionReport) {
        let event = envelope(
            SubscriptionTopic::Resolution,
            report,
            report.resolution.resolved_at,
        );
        let _ = self.resolution_tx.send(event);
    }

    fn publish_log(&self, entry: &LogEntry) {
        let data = serde_json::json!({
            "action": entry.action,
            "details": entry.details,
            "line": entry.line(),
        });
        let event = envelope(SubscriptionTopic::ActionLog, &data, entry.at);
        let _ = self.action_log_tx.send(event);
    }
}

/// Build the HTTP router: `/ws`, plus `/metrics` when a registry is set.
pub fn router(state: Arc<WsState>) -> Router {
    let mut app = Router::new().route("/ws", get(ws_handler));
    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }
    app.layer(CorsLayer::permissive()).with_state(state)
}

/// The WebSocket server, configured with an address and shared state.
pub struct WebSocketServer {
    pub bind_address: String,
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(bind_address: impl Into<String>, port: u16, state: Arc<WsState>) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            state,
        }
    }

    pub async fn bind(&self) -> Result<TcpListener, WsError> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| WsError::Bind { addr, source })
    }

    /// Serve connections on `listener` until `shutdown` completes.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WsError> {
        if let Ok(addr) = listener.local_addr() {
            info!("WebSocket server listening on {}", addr);
        }
        let app = router(self.state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn metrics_handler(State(state): State<Arc<WsState>>) -> impl IntoResponse {
    let Some(registry) = &state.metrics else {
        return (StatusCode::NOT_FOUND, String::new());
    };
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Split the socket into sender and receiver halves.
/// 2. Listen for client messages (subscribe, votes, admin commands, ping).
/// 3. For each active subscription, spawn a forwarder task that reads from
///    the topic broadcast channel and sends events to the client.
/// 4. Clean up all forwarder tasks when the client disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));

    let mut client_subs = ClientSubscriptions::new();

    debug!("New WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(
                    &text,
                    &state,
                    &mut client_subs,
                    &ws_sender,
                )
                .await;
            }
            Message::Close(_) => {
                debug!("Client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    debug!(
        subscriptions = client_subs.len(),
        "WebSocket client disconnected"
    );
}

async fn send_json<T: Serialize>(ws_sender: &WsSender, msg: &T) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!("failed to encode reply: {}", e);
            return false;
        }
    };
    send_text(ws_sender, text).await
}

async fn send_text(ws_sender: &WsSender, text: String) -> bool {
    let mut sender = ws_sender.lock().await;
    sender.send(Message::Text(text)).await.is_ok()
}

/// Process a text message from the client.
async fn handle_text_message(
    text: &str,
    state: &Arc<WsState>,
    client_subs: &mut ClientSubscriptions,
    ws_sender: &WsSender,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let error_msg = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            send_json(ws_sender, &error_msg).await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe { topic } => {
            let replaced = client_subs.is_subscribed(&topic);
            let rx = state.sender_for(&topic).subscribe();
            let sender = ws_sender.clone();
            let handle = tokio::spawn(async move {
                forward_events(rx, sender, topic).await;
            });
            client_subs.subscribe(topic, handle);

            let ack = ServerMessage::Ack {
                action: "subscribe".to_string(),
                topic,
            };
            send_json(ws_sender, &ack).await;

            if topic == SubscriptionTopic::VoteUpdate {
                if let Some(latest) = state.latest_state() {
                    send_text(ws_sender, latest).await;
                }
            }
            debug!(replaced, "Client subscribed to {}", topic);
        }
        ClientMessage::Unsubscribe { topic } => {
            let was_subscribed = client_subs.unsubscribe(&topic);

            let ack = if was_subscribed {
                ServerMessage::Ack {
                    action: "unsubscribe".to_string(),
                    topic,
                }
            } else {
                ServerMessage::Error {
                    message: format!("Not subscribed to {}", topic),
                }
            };
            send_json(ws_sender, &ack).await;
            debug!("Client unsubscribed from {}", topic);
        }
        ClientMessage::Ping => {
            send_json(ws_sender, &ServerMessage::Pong).await;
        }
        ClientMessage::CastVote {
            voter,
            code,
            timestamp,
        } => {
            let accepted = state
                .request(|reply| InboundCommand::CastVote {
                    voter,
                    code,
                    timestamp,
                    reply,
                })
                .await;
            let msg = match accepted {
                Some(accepted) => ServerMessage::VoteResult { accepted },
                None => engine_unavailable(),
            };
            send_json(ws_sender, &msg).await;
        }
        ClientMessage::GetActions => {
            let msg = match state
                .request(|reply| InboundCommand::GetActions { reply })
                .await
            {
                Some(actions) => ServerMessage::Actions { actions },
                None => engine_unavailable(),
            };
            send_json(ws_sender, &msg).await;
        }
        ClientMessage::Admin { command } => {
            let name = command.name().to_string();
            let reply = state
                .request(|reply| InboundCommand::Admin { command, reply })
                .await
                .unwrap_or_else(|| AdminReply::err("engine unavailable"));
            let msg = ServerMessage::AdminResult {
                command: name,
                reply,
            };
            send_json(ws_sender, &msg).await;
        }
    }
}

fn engine_unavailable() -> ServerMessage {
    ServerMessage::Error {
        message: "engine unavailable".to_string(),
    }
}

/// Forwarder task: reads events from a broadcast receiver and sends them to
/// the WebSocket client.
async fn forward_events(
    mut rx: broadcast::Receiver<String>,
    ws_sender: WsSender,
    topic: SubscriptionTopic,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if !send_text(&ws_sender, event).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Client lagged behind by {} events on topic {}", n, topic);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Broadcast channel closed for topic {}", topic);
                break;
            }
        }
    }
}
