//! Inference module for single-image prediction from a saved checkpoint

pub mod predictor;

pub use predictor::{Prediction, Predictor};
