//! Chest X-ray dataset loader
//!
//! Discovers labeled images from the on-disk layout:
//!
//! ```text
//! root/
//! ├── train/
//! │   ├── NORMAL/
//! │   │   └── *.jpeg
//! │   └── PNEUMONIA/
//! │       └── *.jpeg
//! ├── val/
//! └── test/
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{class_index, class_name, CLASS_NAMES, IMAGE_EXTENSIONS};
use crate::utils::error::{Result, XrayError};

/// A dataset split, mapping to a subdirectory of the data root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Directory name of the split under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// All splits in canonical order
    pub fn all() -> [Split; 3] {
        [Split::Train, Split::Val, Split::Test]
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Split {
    type Err = XrayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(XrayError::Config(format!("unknown split '{}'", other))),
        }
    }
}

/// A single image sample with its label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index (0 = NORMAL, 1 = PNEUMONIA)
    pub label: usize,
}

/// One split of the chest X-ray dataset, with samples discovered up front and
/// pixel data loaded lazily.
#[derive(Debug, Clone)]
pub struct ChestXrayDataset {
    /// Which split this dataset was opened from
    pub split: Split,
    /// Split directory on disk
    pub split_dir: PathBuf,
    /// All samples in the split
    pub samples: Vec<ImageSample>,
}

impl ChestXrayDataset {
    /// Open one split of the dataset rooted at `root`.
    ///
    /// Fails with [`XrayError::SplitNotFound`] if the split directory is
    /// absent, [`XrayError::UnknownClass`] if a class directory does not map
    /// to a known label, and [`XrayError::EmptyDataset`] if no images are
    /// found.
    pub fn open<P: AsRef<Path>>(root: P, split: Split) -> Result<Self> {
        let split_dir = root.as_ref().join(split.dir_name());
        info!("Loading chest X-ray {} split from {:?}", split, split_dir);

        if !split_dir.is_dir() {
            return Err(XrayError::SplitNotFound(split_dir));
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&split_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(XrayError::EmptyDataset(split_dir));
        }

        let mut samples = Vec::new();
        for dir_name in &class_dirs {
            let label = class_index(dir_name)
                .ok_or_else(|| XrayError::UnknownClass(dir_name.clone()))?;
            let class_dir = split_dir.join(dir_name);

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                        samples.push(ImageSample { path, label });
                    }
                }
            }

            debug!("Class '{}' (label {}) scanned", dir_name, label);
        }

        if samples.is_empty() {
            return Err(XrayError::EmptyDataset(split_dir));
        }

        info!("Found {} samples in {} split", samples.len(), split);

        Ok(Self {
            split,
            split_dir,
            samples,
        })
    }

    /// Number of samples in the split
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the split contains no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-class and total counts for this split
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = [0usize; CLASS_NAMES.len()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            split: self.split,
            total_samples: self.samples.len(),
            class_counts,
        }
    }
}

/// Statistics about one dataset split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub split: Split,
    pub total_samples: usize,
    pub class_counts: [usize; 2],
}

impl DatasetStats {
    /// Log the statistics
    pub fn log(&self) {
        info!("{} split: {} samples", self.split, self.total_samples);
        for (label, count) in self.class_counts.iter().enumerate() {
            let name = class_name(label).unwrap_or("?");
            let pct = if self.total_samples > 0 {
                100.0 * *count as f64 / self.total_samples as f64
            } else {
                0.0
            };
            info!("  {:10} {:>6} ({:>5.1}%)", name, count, pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn fixture_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("chestxray_vit_loader_{}", name));
        let _ = std::fs::remove_dir_all(&root);
        root
    }

    fn write_images(dir: &Path, count: usize) {
        std::fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            let img = RgbImage::new(4, 4);
            img.save(dir.join(format!("im{}.png", i))).unwrap();
        }
    }

    #[test]
    fn test_open_counts_samples_per_class() {
        let root = fixture_root("counts");
        write_images(&root.join("train/NORMAL"), 3);
        write_images(&root.join("train/PNEUMONIA"), 2);

        let dataset = ChestXrayDataset::open(&root, Split::Train).unwrap();
        assert_eq!(dataset.len(), 5);

        let stats = dataset.stats();
        assert_eq!(stats.class_counts, [3, 2]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_split_is_not_found() {
        let root = fixture_root("missing");
        write_images(&root.join("train/NORMAL"), 1);

        let err = ChestXrayDataset::open(&root, Split::Val).unwrap_err();
        assert!(matches!(err, XrayError::SplitNotFound(_)));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_unknown_class_directory_fails() {
        let root = fixture_root("unknown");
        write_images(&root.join("test/BACTERIAL"), 1);

        let err = ChestXrayDataset::open(&root, Split::Test).unwrap_err();
        assert!(matches!(err, XrayError::UnknownClass(name) if name == "BACTERIAL"));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_empty_split_fails() {
        let root = fixture_root("empty");
        std::fs::create_dir_all(root.join("val")).unwrap();

        let err = ChestXrayDataset::open(&root, Split::Val).unwrap_err();
        assert!(matches!(err, XrayError::EmptyDataset(_)));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_split_parsing() {
        assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
        assert_eq!("Test".parse::<Split>().unwrap(), Split::Test);
        assert!("validation".parse::<Split>().is_err());
    }
}
