//! The selection node: wires the round service to the WebSocket transport
//! and runs the background tasks.
//!
//! Three tasks run until shutdown:
//! - the WebSocket server (`/ws`, optional `/metrics`)
//! - the command loop, applying votes and admin commands in arrival order
//! - the tick loop, advancing the countdown once per tick interval
//!
//! Neither loop waits on action dispatch; [`RoundService`] runs it on its own
//! task and [`SelectionNode::stop`] lets in-flight dispatches finish.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use selection_actions::ActionDispatcher;
use selection_types::{Clock, SystemClock};
use selection_voting::Broadcaster;
use selection_websocket::{AdminCommand, InboundCommand, WebSocketServer, WsState};

use crate::config::NodeConfig;
use crate::metrics::NodeMetrics;
use crate::service::RoundService;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// How long [`SelectionNode::stop`] waits for tasks to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SelectionNode {
    pub config: NodeConfig,
    pub service: RoundService,
    pub ws_state: Arc<WsState>,
    pub metrics: Arc<NodeMetrics>,
    shutdown: Arc<ShutdownController>,
    /// Taken by the command loop on start.
    command_rx: Option<mpsc::Receiver<InboundCommand>>,
    local_addr: Option<SocketAddr>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl SelectionNode {
    /// Build a node with the wall clock and the dispatcher named in `config`.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let dispatcher = config.build_dispatcher();
        Self::with_collaborators(config, Arc::new(SystemClock), dispatcher)
    }

    /// Build a node with an explicit clock and dispatcher.
    pub fn with_collaborators(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let registry = Arc::new(config.build_registry()?);
        let metrics = Arc::new(NodeMetrics::new()?);

        let (command_tx, command_rx) = mpsc::channel(config.command_queue);
        let mut ws_state = WsState::new(config.channel_capacity, command_tx);
        if config.enable_metrics {
            ws_state = ws_state.with_metrics(metrics.registry.clone());
        }
        let ws_state = Arc::new(ws_state);

        let broadcaster: Arc<dyn Broadcaster> = ws_state.clone();
        let service = RoundService::new(
            registry,
            config.timer.clone(),
            clock,
            dispatcher,
            broadcaster,
            Arc::clone(&metrics),
        )?;

        Ok(Self {
            config,
            service,
            ws_state,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            command_rx: Some(command_rx),
            local_addr: None,
            task_handles: Vec::new(),
        })
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Address the WebSocket server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the server and spawn all background tasks. Returns the bound
    /// address (useful with port 0).
    pub async fn start(&mut self) -> Result<SocketAddr, NodeError> {
        let command_rx = self.command_rx.take().ok_or_else(|| {
            NodeError::Config("node already started".to_string())
        })?;

        tracing::info!(
            bind = %self.config.bind_address,
            port = self.config.port,
            base_secs = self.config.timer.base_secs,
            dispatcher = self.config.dispatch.mode.as_str(),
            "selection node starting"
        );

        if self.config.start_cycle_on_boot {
            self.service.admin(AdminCommand::StartCycle).await;
        } else {
            let snapshot = self.service.snapshot().await;
            self.ws_state.publish_state(&snapshot);
        }

        // ── WebSocket server ──────────────────────────────────────────────
        let server = WebSocketServer::new(
            self.config.bind_address.clone(),
            self.config.port,
            Arc::clone(&self.ws_state),
        );
        let listener = server.bind().await?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);
        let shutdown_signal = self.shutdown.signalled();
        let ws_handle = tokio::spawn(async move {
            match server.serve(listener, shutdown_signal).await {
                Ok(()) => tracing::info!("WebSocket server exited"),
                Err(e) => tracing::error!("WebSocket server error: {e}"),
            }
        });
        self.task_handles.push(ws_handle);

        // ── Command loop ──────────────────────────────────────────────────
        let service_cmd = self.service.clone();
        let mut shutdown_rx_cmd = self.shutdown.subscribe();
        let mut command_rx = command_rx;
        let cmd_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_cmd.recv() => {
                        tracing::info!("command loop shutting down");
                        break;
                    }
                    cmd = command_rx.recv() => match cmd {
                        Some(cmd) => service_cmd.handle(cmd).await,
                        None => {
                            tracing::info!("command channel closed");
                            break;
                        }
                    }
                }
            }
        });
        self.task_handles.push(cmd_handle);

        // ── Tick loop ─────────────────────────────────────────────────────
        let service_tick = self.service.clone();
        let mut shutdown_rx_tick = self.shutdown.subscribe();
        let period = Duration::from_millis(self.config.tick_interval_ms);
        let tick_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            // A late tick shifts the schedule instead of firing a catch-up burst.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_tick.recv() => {
                        tracing::info!("tick loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        service_tick.tick().await;
                    }
                }
            }
        });
        self.task_handles.push(tick_handle);

        tracing::info!(%addr, "selection node started");
        Ok(addr)
    }

    /// Start, then block until SIGINT/SIGTERM and stop.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    /// Stop the node gracefully.
    ///
    /// Sends the shutdown signal, then waits for background tasks and any
    /// in-flight dispatch to finish (with a timeout).
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if self.local_addr.is_none() {
            return Err(NodeError::NotStarted);
        }
        tracing::info!("selection node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let service = self.service.clone();
        let wait_all = async move {
            for handle in handles {
                let _ = handle.await;
            }
            let settled = service.settle().await;
            if !settled.is_empty() {
                tracing::info!(count = settled.len(), "in-flight dispatches finished");
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        self.local_addr = None;
        tracing::info!("selection node stopped");
        Ok(())
    }
}
