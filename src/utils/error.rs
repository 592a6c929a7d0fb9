//! Error types for dataset loading, training, and checkpointing.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for chest X-ray training operations
#[derive(Error, Debug)]
pub enum XrayError {
    /// The requested split directory does not exist under the data root
    #[error("split directory not found: {0}")]
    SplitNotFound(PathBuf),

    /// A split directory exists but contains no usable class directories or images
    #[error("no samples found under {0}")]
    EmptyDataset(PathBuf),

    /// A class directory whose name maps to no known label
    #[error("unknown class directory '{0}' (expected NORMAL or PNEUMONIA)")]
    UnknownClass(String),

    /// An image file could not be opened or decoded
    #[error("failed to decode image '{path}': {reason}")]
    ImageDecode { path: PathBuf, reason: String },

    /// Saving or loading a model checkpoint failed
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for chest X-ray operations
pub type Result<T> = std::result::Result<T, XrayError>;
