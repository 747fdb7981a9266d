//! Selection node: runs the vote engine as a service.
//!
//! The node is the coordinator that:
//! - Owns the round behind a single lock ([`RoundService`])
//! - Serves viewers and the admin panel over WebSocket
//! - Ticks the countdown once per second
//! - Dispatches resolved actions off the async executor
//! - Keeps the operator action log, metrics and structured logs

pub mod action_log;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod service;
pub mod shutdown;
pub mod tracing_spans;

pub use action_log::{ActionLog, ACTION_LOG_CAPACITY};
pub use config::{DispatchConfig, DispatchMode, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::SelectionNode;
pub use service::RoundService;
pub use shutdown::{ShutdownController, ShutdownSignal};
