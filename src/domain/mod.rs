//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod phase;
pub mod ref_update;

// Re-export commonly used types
pub use phase::PhaseCommand;
pub use ref_update::RefUpdate;
