//! Shared utilities: error types, logging, and metric accumulators

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, XrayError};
pub use logging::{init_logging, LogConfig};
pub use metrics::{BinaryConfusion, EpochAverage};
