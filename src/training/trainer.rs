//! Training loop
//!
//! Drives forward/backward passes with AdamW, accumulates per-epoch metrics
//! as weighted averages, runs validation at the configured cadence, and
//! maintains the "last" and "best" checkpoints.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::record::CompactRecorder;
use burn::tensor::{backend::AutodiffBackend, ElementConversion};
use tracing::{debug, info};

use crate::dataset::batch::{BatchLoader, XrayBatch, XrayBatcher, XrayItem};
use crate::model::config::{TrainingConfig, ValidationCadence};
use crate::model::vit::BinaryClassifier;
use crate::training::evaluate::{evaluate, EvalReport};
use crate::training::scheduler::LrSchedule;
use crate::utils::error::{Result, XrayError};
use crate::utils::metrics::EpochAverage;

/// File stem of the checkpoint overwritten every epoch
pub const LAST_CHECKPOINT: &str = "last-model";
/// File stem of the checkpoint overwritten on validation improvement
pub const BEST_CHECKPOINT: &str = "best-model";

/// Validation loss the best tracker starts from
const INITIAL_BEST_VAL_LOSS: f64 = 100.0;

/// Tracks the lowest validation loss seen so far.
///
/// The best value only ever decreases, so the loss associated with the saved
/// best checkpoint is non-increasing across a run.
#[derive(Debug, Clone)]
pub struct BestTracker {
    best: f64,
}

impl BestTracker {
    pub fn new() -> Self {
        Self {
            best: INITIAL_BEST_VAL_LOSS,
        }
    }

    /// Observe one epoch's validation loss; returns true on strict improvement
    pub fn observe(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best {
            self.best = val_loss;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Save a model snapshot with Burn's compact recorder (`.mpk`)
fn save_checkpoint<B, M>(model: &M, path: &Path) -> Result<()>
where
    B: burn::tensor::backend::Backend,
    M: Module<B>,
{
    let recorder = CompactRecorder::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| XrayError::Checkpoint(format!("failed to save {:?}: {:?}", path, e)))
}

/// Load a snapshot into a freshly initialized model
pub fn load_checkpoint<B, M>(model: M, path: &Path, device: &B::Device) -> Result<M>
where
    B: burn::tensor::backend::Backend,
    M: Module<B>,
{
    let recorder = CompactRecorder::new();
    model
        .load_file(path, &recorder, device)
        .map_err(|e| XrayError::Checkpoint(format!("failed to load {:?}: {:?}", path, e)))
}

/// Train the model for the configured number of epochs.
///
/// Side effects: writes the run configuration, the `last-model` checkpoint
/// every epoch, and the `best-model` checkpoint whenever the validation loss
/// strictly improves. Validation is skipped entirely when `val_set` is absent
/// or empty. Any model, loss, optimizer, or checkpoint error aborts the run;
/// there are no retries.
pub fn train<B, M, DT, DV>(
    mut model: M,
    train_set: &DT,
    val_set: Option<&DV>,
    batcher: &XrayBatcher,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<M>
where
    B: AutodiffBackend,
    M: BinaryClassifier<B> + AutodiffModule<B>,
    M::InnerModule: BinaryClassifier<B::InnerBackend>,
    DT: Dataset<XrayItem>,
    DV: Dataset<XrayItem>,
{
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;
    config.save(&config.output_dir.join("training.json"))?;

    B::seed(config.seed);

    let train_loader = BatchLoader::new(config.train_batch_size, true, config.seed);
    let val_loader = BatchLoader::new(config.val_batch_size, true, config.seed.wrapping_add(1));
    let schedule = LrSchedule::step_decay(config.learning_rate, config.lr_step_size, config.lr_gamma);

    let mut optimizer = AdamWConfig::new()
        .with_weight_decay(config.weight_decay)
        .init();
    let mut best = BestTracker::new();

    let val_set = val_set.filter(|v| !v.is_empty());
    let last_path = checkpoint_path(&config.output_dir, LAST_CHECKPOINT);
    let best_path = checkpoint_path(&config.output_dir, BEST_CHECKPOINT);

    info!(
        "Training for {} epochs ({} train samples, validation {}, {})",
        config.epochs,
        train_set.len(),
        match val_set {
            Some(v) => format!("{} samples", v.len()),
            None => "disabled".to_string(),
        },
        if config.step_lr_each_epoch {
            schedule.description()
        } else {
            format!("constant lr={:.6}", config.learning_rate)
        },
    );

    for epoch in 0..config.epochs {
        let lr = if config.step_lr_each_epoch {
            schedule.lr_at(epoch)
        } else {
            config.learning_rate
        };

        let num_batches = train_loader.num_batches(train_set.len());
        let mut epoch_loss = EpochAverage::new(num_batches);
        let mut epoch_accuracy = EpochAverage::new(num_batches);
        let mut val_report: Option<EvalReport> = None;

        for (batch_idx, items) in train_loader.iter(train_set, epoch).enumerate() {
            let batch: XrayBatch<B> = batcher.batch(items, device);
            let batch_size = batch.targets.dims()[0];

            let probs = model.forward(batch.images.clone());
            let loss = BinaryCrossEntropyLossConfig::new()
                .init(&probs.device())
                .forward(probs.clone(), batch.targets.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(lr, model, grads);

            let predictions = probs.greater_equal_elem(0.5).int();
            let correct: i64 = predictions
                .equal(batch.targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();

            epoch_loss.add(loss_value);
            epoch_accuracy.add(correct as f64 / batch_size as f64);

            debug!(
                "epoch {} batch {}/{}: loss = {:.4}",
                epoch + 1,
                batch_idx + 1,
                num_batches,
                loss_value
            );

            if config.validation_cadence == ValidationCadence::PerBatch {
                if let Some(val) = val_set {
                    val_report =
                        Some(evaluate(&model.valid(), val, &val_loader, batcher, device));
                }
            }
        }

        if config.validation_cadence == ValidationCadence::PerEpoch {
            if let Some(val) = val_set {
                val_report = Some(evaluate(&model.valid(), val, &val_loader, batcher, device));
            }
        }

        match &val_report {
            Some(val) => info!(
                "Epoch {} - loss: {:.4} - acc: {:.4} - val_loss: {:.4} - val_acc: {:.4}",
                epoch + 1,
                epoch_loss.value(),
                epoch_accuracy.value(),
                val.loss,
                val.accuracy,
            ),
            None => info!(
                "Epoch {} - loss: {:.4} - acc: {:.4}",
                epoch + 1,
                epoch_loss.value(),
                epoch_accuracy.value(),
            ),
        }

        if let Some(val) = &val_report {
            if best.observe(val.loss) {
                save_checkpoint(&model, &best_path)?;
                info!("saved best (val loss {:.4})", val.loss);
            }
        }

        save_checkpoint(&model, &last_path)?;
    }

    if best.best() < INITIAL_BEST_VAL_LOSS {
        info!("Training complete (best val loss {:.4})", best.best());
    } else {
        info!("Training complete");
    }

    Ok(model)
}

/// Path of a named checkpoint under the output directory (without extension;
/// the recorder appends `.mpk`)
pub fn checkpoint_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DefaultBackend, TrainingBackend};
    use crate::model::vit::ViTConfig;
    use burn::tensor::Tensor;

    #[test]
    fn test_best_tracker_reference_sequence() {
        // val losses [0.9, 0.7, 0.8, 0.5] from initial best 100:
        // epochs 1, 2, and 4 save; epoch 3 does not
        let mut tracker = BestTracker::new();
        let observed: Vec<bool> = [0.9, 0.7, 0.8, 0.5]
            .iter()
            .map(|&loss| tracker.observe(loss))
            .collect();

        assert_eq!(observed, vec![true, true, false, true]);
        assert!((tracker.best() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_best_tracker_requires_strict_decrease() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(0.4));
        assert!(!tracker.observe(0.4));
    }

    #[test]
    fn test_best_tracker_is_monotone() {
        let mut tracker = BestTracker::new();
        let mut saved = Vec::new();
        for loss in [3.0, 2.5, 2.7, 1.0, 1.5, 0.2] {
            if tracker.observe(loss) {
                saved.push(loss);
            }
        }
        assert!(saved.windows(2).all(|w| w[1] < w[0]));
    }

    fn tiny_model_config() -> ViTConfig {
        ViTConfig::new()
            .with_image_size(8)
            .with_patch_size(4)
            .with_d_model(8)
            .with_n_heads(2)
            .with_n_layers(1)
            .with_d_mlp(16)
            .with_dropout(0.0)
    }

    struct StubDataset {
        labels: Vec<usize>,
    }

    impl Dataset<XrayItem> for StubDataset {
        fn get(&self, index: usize) -> Option<XrayItem> {
            self.labels.get(index).map(|&label| XrayItem {
                image: vec![label as f32; 3 * 8 * 8],
                label,
            })
        }

        fn len(&self) -> usize {
            self.labels.len()
        }
    }

    fn test_output_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chestxray_vit_trainer_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_train_writes_last_and_best_checkpoints() {
        let device = Default::default();
        let model = tiny_model_config().init::<TrainingBackend>(&device);

        let train_set = StubDataset {
            labels: vec![0, 1, 0, 1],
        };
        let val_set = StubDataset {
            labels: vec![0, 1],
        };
        let output_dir = test_output_dir("checkpoints");

        let config = TrainingConfig {
            epochs: 2,
            train_batch_size: 2,
            val_batch_size: 2,
            output_dir: output_dir.clone(),
            ..Default::default()
        };

        let trained = train(
            model,
            &train_set,
            Some(&val_set),
            &XrayBatcher::with_image_size(8),
            &config,
            &device,
        );
        assert!(trained.is_ok());

        assert!(output_dir.join("last-model.mpk").is_file());
        assert!(output_dir.join("best-model.mpk").is_file());
        assert!(output_dir.join("training.json").is_file());

        std::fs::remove_dir_all(&output_dir).unwrap();
    }

    #[test]
    fn test_train_without_validation_skips_best() {
        let device = Default::default();
        let model = tiny_model_config().init::<TrainingBackend>(&device);

        let train_set = StubDataset {
            labels: vec![0, 1, 1],
        };
        let output_dir = test_output_dir("no_val");

        let config = TrainingConfig {
            epochs: 1,
            train_batch_size: 2,
            output_dir: output_dir.clone(),
            ..Default::default()
        };

        let trained = train::<TrainingBackend, _, _, StubDataset>(
            model,
            &train_set,
            None,
            &XrayBatcher::with_image_size(8),
            &config,
            &device,
        );
        assert!(trained.is_ok());

        assert!(output_dir.join("last-model.mpk").is_file());
        assert!(!output_dir.join("best-model.mpk").exists());

        std::fs::remove_dir_all(&output_dir).unwrap();
    }

    #[test]
    fn test_checkpoint_round_trip_preserves_outputs() {
        let device = Default::default();
        let model = tiny_model_config().init::<DefaultBackend>(&device);

        let dir = test_output_dir("roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = checkpoint_path(&dir, LAST_CHECKPOINT);
        save_checkpoint(&model, &path).unwrap();

        let fresh = tiny_model_config().init::<DefaultBackend>(&device);
        let restored = load_checkpoint(fresh, &path, &device).unwrap();

        let input = Tensor::<DefaultBackend, 4>::ones([2, 3, 8, 8], &device);
        let before: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let after: Vec<f32> = restored.forward(input).into_data().to_vec().unwrap();

        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
