//! Metric accumulators shared by the training and evaluation loops.

use serde::{Deserialize, Serialize};

/// Weighted-average accumulator for per-epoch loss and accuracy.
///
/// Each added value contributes with weight `1 / num_batches`, so after every
/// batch of an epoch has been added the accumulator holds the batch-level
/// average. An accumulator built over zero batches reports 0.
#[derive(Debug, Clone, Copy)]
pub struct EpochAverage {
    total: f64,
    weight: f64,
}

impl EpochAverage {
    /// Create an accumulator for an epoch of `num_batches` batches
    pub fn new(num_batches: usize) -> Self {
        let weight = if num_batches == 0 {
            0.0
        } else {
            1.0 / num_batches as f64
        };
        Self { total: 0.0, weight }
    }

    /// Add one batch-level value
    pub fn add(&mut self, value: f64) {
        self.total += value * self.weight;
    }

    /// Current accumulated average
    pub fn value(&self) -> f64 {
        self.total
    }
}

/// Binary confusion counts with derived metrics.
///
/// Label 1 (PNEUMONIA) is the positive class.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BinaryConfusion {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl BinaryConfusion {
    /// Record one (prediction, target) pair of 0/1 labels
    pub fn record(&mut self, prediction: usize, target: usize) {
        match (prediction, target) {
            (1, 1) => self.true_positives += 1,
            (0, 0) => self.true_negatives += 1,
            (1, 0) => self.false_positives += 1,
            _ => self.false_negatives += 1,
        }
    }

    /// Total number of recorded samples
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positives + self.true_negatives) as f64 / total as f64
    }

    pub fn precision(&self) -> f64 {
        let predicted_positive = self.true_positives + self.false_positives;
        if predicted_positive == 0 {
            return 0.0;
        }
        self.true_positives as f64 / predicted_positive as f64
    }

    pub fn recall(&self) -> f64 {
        let actual_positive = self.true_positives + self.false_negatives;
        if actual_positive == 0 {
            return 0.0;
        }
        self.true_positives as f64 / actual_positive as f64
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}
