//! Burn dataset integration and batch loading
//!
//! [`XrayBurnDataset`] implements Burn's `Dataset` trait with lazy image
//! loading and per-split preprocessing. [`BatchLoader`] turns a dataset into a
//! lazy, finite, restartable sequence of item batches with a fresh shuffle
//! order per epoch, and [`XrayBatcher`] collates items into stacked tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::ImageReader;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use super::loader::ChestXrayDataset;
use super::transform::Preprocessor;
use crate::IMAGE_SIZE;

/// A single preprocessed sample ready for batching
#[derive(Clone, Debug)]
pub struct XrayItem {
    /// Image data as a flattened CHW float array `[3 * size * size]`
    pub image: Vec<f32>,
    /// Class label (0 = NORMAL, 1 = PNEUMONIA)
    pub label: usize,
}

/// Burn dataset over one chest X-ray split.
///
/// Images are decoded on demand; an image that fails to decode is logged and
/// skipped by the batch iterator.
#[derive(Debug, Clone)]
pub struct XrayBurnDataset {
    samples: Vec<(std::path::PathBuf, usize)>,
    preprocessor: Preprocessor,
}

impl XrayBurnDataset {
    pub fn new(dataset: &ChestXrayDataset, preprocessor: Preprocessor) -> Self {
        let samples = dataset
            .samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect();
        Self {
            samples,
            preprocessor,
        }
    }
}

impl Dataset<XrayItem> for XrayBurnDataset {
    fn get(&self, index: usize) -> Option<XrayItem> {
        let (path, label) = self.samples.get(index)?;

        let image = match ImageReader::open(path).map_err(|e| e.to_string()) {
            Ok(reader) => match reader.decode() {
                Ok(image) => image,
                Err(e) => {
                    warn!("skipping undecodable image {:?}: {}", path, e);
                    return None;
                }
            },
            Err(e) => {
                warn!("skipping unreadable image {:?}: {}", path, e);
                return None;
            }
        };

        Some(XrayItem {
            image: self.preprocessor.apply(&image),
            label: *label,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A collated batch of chest X-ray images
#[derive(Clone, Debug)]
pub struct XrayBatch<B: Backend> {
    /// Images with shape `[batch_size, 3, size, size]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher collating [`XrayItem`]s into an [`XrayBatch`]
#[derive(Clone, Debug)]
pub struct XrayBatcher {
    image_size: usize,
}

impl XrayBatcher {
    pub fn new() -> Self {
        Self {
            image_size: IMAGE_SIZE,
        }
    }

    pub fn with_image_size(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl Default for XrayBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, XrayItem, XrayBatch<B>> for XrayBatcher {
    fn batch(&self, items: Vec<XrayItem>, device: &B::Device) -> XrayBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        XrayBatch { images, targets }
    }
}

/// Lazy mini-batch loader over a Burn dataset.
///
/// With `shuffle` set, each epoch visits the dataset in a fresh order derived
/// from the seed and the epoch number; without it, batches follow dataset
/// order. The final batch is smaller when the dataset length is not a
/// multiple of the batch size.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl BatchLoader {
    pub fn new(batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            batch_size,
            shuffle,
            seed,
        }
    }

    /// Number of batches one pass over `len` samples yields
    pub fn num_batches(&self, len: usize) -> usize {
        (len + self.batch_size - 1) / self.batch_size
    }

    /// Iterate one epoch over the dataset
    pub fn iter<'a, D: Dataset<XrayItem>>(&self, dataset: &'a D, epoch: usize) -> BatchIter<'a, D> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }

        BatchIter {
            dataset,
            order,
            batch_size: self.batch_size,
            cursor: 0,
        }
    }
}

/// Iterator over the batches of one epoch
pub struct BatchIter<'a, D: Dataset<XrayItem>> {
    dataset: &'a D,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<D: Dataset<XrayItem>> Iterator for BatchIter<'_, D> {
    type Item = Vec<XrayItem>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.order.len() {
            let end = (self.cursor + self.batch_size).min(self.order.len());
            let items: Vec<XrayItem> = self.order[self.cursor..end]
                .iter()
                .filter_map(|&i| self.dataset.get(i))
                .collect();
            self.cursor = end;

            if !items.is_empty() {
                return Some(items);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    /// In-memory dataset whose item images carry their own index
    struct StubDataset {
        len: usize,
    }

    impl Dataset<XrayItem> for StubDataset {
        fn get(&self, index: usize) -> Option<XrayItem> {
            (index < self.len).then(|| XrayItem {
                image: vec![index as f32],
                label: index % 2,
            })
        }

        fn len(&self) -> usize {
            self.len
        }
    }

    #[test]
    fn test_num_batches_is_ceiling() {
        let loader = BatchLoader::new(2, false, 0);
        assert_eq!(loader.num_batches(5), 3);
        assert_eq!(loader.num_batches(4), 2);
        assert_eq!(loader.num_batches(0), 0);
    }

    #[test]
    fn test_sequential_batch_sizes() {
        let dataset = StubDataset { len: 5 };
        let loader = BatchLoader::new(2, false, 0);

        let sizes: Vec<usize> = loader.iter(&dataset, 0).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_shuffled_epoch_covers_dataset_exactly_once() {
        let dataset = StubDataset { len: 23 };
        let loader = BatchLoader::new(4, true, 7);

        let mut seen: Vec<usize> = loader
            .iter(&dataset, 0)
            .flatten()
            .map(|item| item.image[0] as usize)
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_deterministic_per_epoch_and_varies_across_epochs() {
        let dataset = StubDataset { len: 16 };
        let loader = BatchLoader::new(4, true, 7);

        let epoch0: Vec<usize> = loader
            .iter(&dataset, 0)
            .flatten()
            .map(|item| item.image[0] as usize)
            .collect();
        let epoch0_again: Vec<usize> = loader
            .iter(&dataset, 0)
            .flatten()
            .map(|item| item.image[0] as usize)
            .collect();
        let epoch1: Vec<usize> = loader
            .iter(&dataset, 1)
            .flatten()
            .map(|item| item.image[0] as usize)
            .collect();

        assert_eq!(epoch0, epoch0_again);
        assert_ne!(epoch0, epoch1);
    }

    #[test]
    fn test_batcher_collates_shapes_and_targets() {
        let items = vec![
            XrayItem {
                image: vec![0.0; 3 * 2 * 2],
                label: 0,
            },
            XrayItem {
                image: vec![1.0; 3 * 2 * 2],
                label: 1,
            },
        ];

        let batcher = XrayBatcher::with_image_size(2);
        let device = Default::default();
        let batch: XrayBatch<DefaultBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1]);
    }
}
