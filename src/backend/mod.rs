//! Backend module for inspection executors
//!
//! This module provides the executor abstraction, the registry that
//! resolves item types to executors, and the built-in executors.

mod traits;
mod registry;
mod command;
mod mock;

pub use traits::*;
pub use registry::*;
pub use command::{ShellConfig, ShellExecutor};
pub use mock::{MockConfig, MockExecutor};
