//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod hook_service;
pub mod phase_executor;

// Re-export commonly used types
pub use hook_service::{ComposeHook, HookSettings};
pub use phase_executor::PhaseExecutor;
