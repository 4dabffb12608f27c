//! Type definitions for the patrol agent
//!
//! Tasks, items, per-item results and the completion payload.

mod task;

pub use task::*;
