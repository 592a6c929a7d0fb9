//! Model module for the Vision Transformer built with Burn
//!
//! This module provides:
//! - The Vision Transformer architecture producing one probability per image
//! - The [`vit::BinaryClassifier`] trait the training and evaluation loops
//!   depend on
//! - Training configuration and hyperparameters

pub mod config;
pub mod vit;

// Re-export main types for convenience
pub use config::{TrainingConfig, ValidationCadence};
pub use vit::{BinaryClassifier, ViTConfig, VisionTransformer};
