//! Evaluation loop
//!
//! Runs a model over a held-out split without gradient tracking and reports
//! aggregate loss, accuracy, and binary confusion counts. Loss and accuracy
//! are true running weighted averages over batches (weight `1/num_batches`).

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::tensor::{backend::Backend, ElementConversion};
use tracing::info;

use crate::dataset::batch::{BatchLoader, XrayBatch, XrayBatcher, XrayItem};
use crate::model::vit::BinaryClassifier;
use crate::utils::metrics::{BinaryConfusion, EpochAverage};

/// Aggregate result of one evaluation pass
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Average binary cross-entropy over batches
    pub loss: f64,
    /// Average rounded-prediction accuracy over batches
    pub accuracy: f64,
    /// Confusion counts over all evaluated samples
    pub confusion: BinaryConfusion,
}

impl EvalReport {
    /// Log the report under the given tag
    pub fn log(&self, tag: &str) {
        info!(
            "{}: loss = {:.4} - acc = {:.4} (precision {:.4}, recall {:.4}, f1 {:.4}, {} samples)",
            tag,
            self.loss,
            self.accuracy,
            self.confusion.precision(),
            self.confusion.recall(),
            self.confusion.f1(),
            self.confusion.total(),
        );
    }
}

/// Evaluate a model over one pass of the loader.
///
/// Callers are expected to pass a non-autodiff model (for a trained autodiff
/// module, `model.valid()`), so no gradient state is accumulated. An empty
/// loader yields a zeroed report rather than dividing by zero.
pub fn evaluate<B, M, D>(
    model: &M,
    dataset: &D,
    loader: &BatchLoader,
    batcher: &XrayBatcher,
    device: &B::Device,
) -> EvalReport
where
    B: Backend,
    M: BinaryClassifier<B>,
    D: Dataset<XrayItem>,
{
    let num_batches = loader.num_batches(dataset.len());
    let mut loss_avg = EpochAverage::new(num_batches);
    let mut accuracy_avg = EpochAverage::new(num_batches);
    let mut confusion = BinaryConfusion::default();

    for items in loader.iter(dataset, 0) {
        let batch: XrayBatch<B> = batcher.batch(items, device);
        let batch_size = batch.targets.dims()[0];

        let probs = model.forward(batch.images.clone());
        let loss = BinaryCrossEntropyLossConfig::new()
            .init(&probs.device())
            .forward(probs.clone(), batch.targets.clone());
        loss_avg.add(loss.into_scalar().elem::<f64>());

        let predictions = probs.greater_equal_elem(0.5).int();
        let correct: i64 = predictions
            .clone()
            .equal(batch.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();
        accuracy_avg.add(correct as f64 / batch_size as f64);

        let pred_vec: Vec<i64> = predictions.into_data().to_vec().unwrap();
        let target_vec: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        for (p, t) in pred_vec.iter().zip(target_vec.iter()) {
            confusion.record(*p as usize, *t as usize);
        }
    }

    EvalReport {
        loss: loss_avg.value(),
        accuracy: accuracy_avg.value(),
        confusion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::tensor::Tensor;

    /// Model that predicts the same probability for every image
    struct ConstantModel {
        prob: f32,
    }

    impl BinaryClassifier<DefaultBackend> for ConstantModel {
        fn forward(
            &self,
            images: Tensor<DefaultBackend, 4>,
        ) -> Tensor<DefaultBackend, 1> {
            let [batch, _, _, _] = images.dims();
            Tensor::full([batch], self.prob, &images.device())
        }
    }

    struct StubDataset {
        labels: Vec<usize>,
    }

    impl Dataset<XrayItem> for StubDataset {
        fn get(&self, index: usize) -> Option<XrayItem> {
            self.labels.get(index).map(|&label| XrayItem {
                image: vec![0.5; 3 * 2 * 2],
                label,
            })
        }

        fn len(&self) -> usize {
            self.labels.len()
        }
    }

    fn run_eval(labels: Vec<usize>, prob: f32) -> EvalReport {
        let model = ConstantModel { prob };
        let dataset = StubDataset { labels };
        let loader = BatchLoader::new(2, false, 0);
        let batcher = XrayBatcher::with_image_size(2);
        let device = Default::default();

        evaluate(&model, &dataset, &loader, &batcher, &device)
    }

    #[test]
    fn test_empty_dataset_yields_zeroed_report() {
        let report = run_eval(vec![], 0.5);
        assert_eq!(report.loss, 0.0);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.confusion.total(), 0);
    }

    #[test]
    fn test_probability_above_half_rounds_to_positive() {
        // prob 0.6 vs target 1: rounded prediction 1, correct
        let report = run_eval(vec![1], 0.6);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.confusion.true_positives, 1);
    }

    #[test]
    fn test_loss_is_averaged_across_batches() {
        // Two batches of [1, 0] with p = 0.7; each batch's BCE is
        // (-ln 0.7 - ln 0.3) / 2, so the running average equals it too
        let report = run_eval(vec![1, 0, 1, 0], 0.7);

        let expected = (-(0.7f64.ln()) - 0.3f64.ln()) / 2.0;
        assert!((report.loss - expected).abs() < 1e-3);
        assert!((report.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(report.confusion.true_positives, 2);
        assert_eq!(report.confusion.false_positives, 2);
    }

    #[test]
    fn test_loss_nonnegative_and_accuracy_in_unit_interval() {
        let report = run_eval(vec![0, 1, 1, 0, 1], 0.42);
        assert!(report.loss >= 0.0);
        assert!((0.0..=1.0).contains(&report.accuracy));
    }
}
