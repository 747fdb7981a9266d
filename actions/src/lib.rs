//! Action catalog and dispatch for the Selection Protocol.
//!
//! Every vote code maps to an [`Action`]. The [`ActionRegistry`] is the single
//! source of truth for which codes exist, which are enabled, and what role
//! each plays in resolution:
//! - two **decisive** codes, which trigger a keypress when they win;
//! - one of them optionally carries the **claim** side channel;
//! - one **neutral** code, which wins ties and dispatches nothing.
//!
//! Executing a resolved action is delegated to an [`ActionDispatcher`].

pub mod dispatcher;
pub mod error;
pub mod registry;

pub use dispatcher::{ActionDispatcher, CommandDispatcher, DispatchReport, LogDispatcher};
pub use error::{ActionError, DispatchError};
pub use registry::{Action, ActionRegistry, ActionRole};
