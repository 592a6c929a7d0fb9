//! # Chest X-Ray Vision Transformer
//!
//! A Rust library for training and evaluating a Vision Transformer binary
//! classifier on chest X-ray images (NORMAL vs PNEUMONIA) using the Burn
//! framework.
//!
//! ## Modules
//!
//! - `dataset`: Split discovery, image preprocessing, and batch loading
//! - `model`: Vision Transformer architecture built with Burn
//! - `training`: Training loop, evaluation loop, and learning rate scheduling
//! - `inference`: Single-image prediction from a saved checkpoint
//! - `utils`: Logging, metrics, and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chestxray_vit::dataset::{ChestXrayDataset, Split};
//! use chestxray_vit::model::ViTConfig;
//!
//! // Load the training split
//! let dataset = ChestXrayDataset::open("data/chest_xray", Split::Train)?;
//!
//! // Create the model
//! let config = ViTConfig::new();
//! // ... training and inference
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::batch::{BatchLoader, XrayBatch, XrayBatcher, XrayBurnDataset, XrayItem};
pub use dataset::loader::{ChestXrayDataset, DatasetStats, ImageSample, Split};
pub use dataset::transform::{Preprocessor, TransformMode};
pub use inference::predictor::{Prediction, Predictor};
pub use model::config::{TrainingConfig, ValidationCadence};
pub use model::vit::{BinaryClassifier, ViTConfig, VisionTransformer};
pub use training::evaluate::{evaluate, EvalReport};
pub use training::scheduler::LrSchedule;
pub use training::trainer::{load_checkpoint, train, BestTracker};
pub use utils::error::{Result, XrayError};
pub use utils::metrics::{BinaryConfusion, EpochAverage};

/// Input image side length expected by the model
pub const IMAGE_SIZE: usize = 224;

/// Number of target classes (binary)
pub const NUM_CLASSES: usize = 2;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
