//! Task orchestration module
//!
//! Handles the task lifecycle:
//! - Admitting tasks through a bounded pool
//! - Dispatching items to executors under a shared context
//! - Tracking task state and evicting finished tasks
//! - Notifying completion callbacks

mod callback;
mod context;
mod runner;
mod state;

pub use callback::*;
pub use context::*;
pub use runner::*;
pub use state::*;
