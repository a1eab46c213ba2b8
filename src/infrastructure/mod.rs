//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Subprocesses (git, docker-compose) with bounded waits
//! - Workspace checkouts on disk

pub mod process;
pub mod workspace;

// Re-export commonly used types
pub use process::{CommandRunner, CommandSpec, ProcessRunner};
pub use workspace::{Workspace, WorkspaceMaterializer};
