//! Dataset module for chest X-ray data handling
//!
//! This module provides:
//! - Discovery of labeled images from the train/val/test directory layout
//! - Per-split image preprocessing (augmentation for training, resize for
//!   evaluation)
//! - Batch loading with per-epoch shuffling and Burn batcher integration

pub mod batch;
pub mod loader;
pub mod transform;

// Re-export main types for convenience
pub use batch::{BatchLoader, XrayBatch, XrayBatcher, XrayBurnDataset, XrayItem};
pub use loader::{ChestXrayDataset, DatasetStats, ImageSample, Split};
pub use transform::{Preprocessor, TransformMode};

/// Class names for the chest X-ray dataset, in label order
pub const CLASS_NAMES: [&str; 2] = ["NORMAL", "PNEUMONIA"];

/// Image file extensions recognized by the loader
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name(0), Some("NORMAL"));
        assert_eq!(class_name(1), Some("PNEUMONIA"));
        assert_eq!(class_name(2), None);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(class_index("NORMAL"), Some(0));
        assert_eq!(class_index("PNEUMONIA"), Some(1));
        assert_eq!(class_index("BACTERIA"), None);
    }
}
