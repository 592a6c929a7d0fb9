//! Training module
//!
//! This module provides:
//! - The main training loop with checkpoint selection
//! - The evaluation loop for held-out splits
//! - Learning rate scheduling

pub mod evaluate;
pub mod scheduler;
pub mod trainer;

// Re-export main types for convenience
pub use evaluate::{evaluate, EvalReport};
pub use scheduler::LrSchedule;
pub use trainer::{load_checkpoint, train, BestTracker, BEST_CHECKPOINT, LAST_CHECKPOINT};
