//! Learning rate schedules

use serde::{Deserialize, Serialize};

/// Epoch-indexed learning rate schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Constant learning rate (no scheduling)
    Constant { lr: f64 },

    /// Step decay: multiply by `gamma` every `step_size` epochs
    StepDecay {
        initial_lr: f64,
        step_size: usize,
        gamma: f64,
    },
}

impl LrSchedule {
    pub fn constant(lr: f64) -> Self {
        Self::Constant { lr }
    }

    pub fn step_decay(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self::StepDecay {
            initial_lr,
            step_size,
            gamma,
        }
    }

    /// Learning rate for a given 0-indexed epoch
    pub fn lr_at(&self, epoch: usize) -> f64 {
        match self {
            Self::Constant { lr } => *lr,

            Self::StepDecay {
                initial_lr,
                step_size,
                gamma,
            } => {
                let num_decays = if *step_size == 0 {
                    0
                } else {
                    epoch / step_size
                };
                initial_lr * gamma.powi(num_decays as i32)
            }
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            Self::Constant { lr } => format!("constant lr={:.6}", lr),
            Self::StepDecay {
                initial_lr,
                step_size,
                gamma,
            } => format!(
                "step decay: initial={:.6}, step={}, gamma={}",
                initial_lr, step_size, gamma
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_schedule() {
        let schedule = LrSchedule::constant(1e-3);
        assert_eq!(schedule.lr_at(0), 1e-3);
        assert_eq!(schedule.lr_at(250), 1e-3);
    }

    #[test]
    fn test_step_decay_schedule() {
        let schedule = LrSchedule::step_decay(1e-3, 10, 0.1);

        assert!((schedule.lr_at(0) - 1e-3).abs() < 1e-12);
        assert!((schedule.lr_at(9) - 1e-3).abs() < 1e-12);
        assert!((schedule.lr_at(10) - 1e-4).abs() < 1e-12);
        assert!((schedule.lr_at(19) - 1e-4).abs() < 1e-12);
        assert!((schedule.lr_at(20) - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_step_decay_zero_step_size_never_decays() {
        let schedule = LrSchedule::step_decay(1e-3, 0, 0.1);
        assert_eq!(schedule.lr_at(100), 1e-3);
    }
}
