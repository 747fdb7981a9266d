//! WebSocket transport for the vote engine.
//!
//! Viewers and the overlay connect to `/ws` and can:
//! - Cast votes
//! - Subscribe to round updates, resolutions and the admin action log
//! - List the enabled actions
//! - Issue admin commands
//!
//! The transport owns no round state. Votes and commands are forwarded to
//! the engine over an [`InboundCommand`] channel; the engine publishes back
//! through the [`Broadcaster`](selection_voting::Broadcaster) impl on
//! [`WsState`].

pub mod command;
pub mod error;
pub mod server;
pub mod subscriptions;

pub use command::{AdminCommand, AdminReply, InboundCommand};
pub use error::WsError;
pub use server::{router, WebSocketServer, WsState};
pub use subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage, SubscriptionTopic};
