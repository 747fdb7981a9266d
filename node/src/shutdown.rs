//! Shutdown signalling for the node's tasks.
//!
//! The stop flag lives in a `tokio::sync::watch` channel, so a task that
//! subscribes after shutdown was triggered still sees it. The WebSocket
//! server takes [`ShutdownController::signalled`]; the command and tick loops
//! `select!` on [`ShutdownSignal::recv`].

use tokio::signal;
use tokio::sync::watch;

/// Owns the stop flag. Cheap to share behind an `Arc`.
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// One task's view of the stop flag.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered, immediately if it already was.
    pub async fn recv(&mut self) {
        // An error means the controller is gone, which also ends the task.
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// An owned future for `axum::serve(..).with_graceful_shutdown`.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut signal = self.subscribe();
        async move { signal.recv().await }
    }

    /// Block until SIGINT or SIGTERM, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, stopping selection node"); }
            _ = terminate => { tracing::info!("received SIGTERM, stopping selection node"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
