//! Single-image prediction from a saved checkpoint

use std::path::Path;
use std::time::Instant;

use burn::tensor::{backend::Backend, ElementConversion, Tensor, TensorData};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::transform::Preprocessor;
use crate::dataset::{class_name, CLASS_NAMES};
use crate::model::vit::{ViTConfig, VisionTransformer};
use crate::training::trainer::load_checkpoint;
use crate::utils::error::{Result, XrayError};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index (0 = NORMAL, 1 = PNEUMONIA)
    pub label: usize,
    /// Predicted class name
    pub class_name: String,
    /// Model output probability of the positive class
    pub probability: f32,
    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

/// Loads a checkpoint once and predicts individual images
pub struct Predictor<B: Backend> {
    model: VisionTransformer<B>,
    preprocessor: Preprocessor,
    image_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Load a model checkpoint for inference
    pub fn load(checkpoint: &Path, config: &ViTConfig, device: &B::Device) -> Result<Self> {
        info!("Loading checkpoint {:?}", checkpoint);

        let model = config.init::<B>(device);
        let model = load_checkpoint(model, checkpoint, device)?;

        Ok(Self {
            model,
            preprocessor: Preprocessor::eval(config.image_size, 0, false),
            image_size: config.image_size,
            device: device.clone(),
        })
    }

    /// Predict the class of a single image file
    pub fn predict(&self, path: &Path) -> Result<Prediction> {
        let image = ImageReader::open(path)
            .map_err(|e| XrayError::ImageDecode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .decode()
            .map_err(|e| XrayError::ImageDecode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let data = self.preprocessor.apply(&image);
        let size = self.image_size;
        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [1, 3, size, size]),
            &self.device,
        );

        let start = Instant::now();
        let probability: f32 = self.model.forward(input).into_scalar().elem();
        let elapsed = start.elapsed();

        let label = usize::from(probability >= 0.5);

        Ok(Prediction {
            label,
            class_name: class_name(label).unwrap_or(CLASS_NAMES[0]).to_string(),
            probability,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::module::Module;
    use burn::record::CompactRecorder;
    use image::RgbImage;
    use std::path::PathBuf;

    fn tiny_config() -> ViTConfig {
        ViTConfig::new()
            .with_image_size(8)
            .with_patch_size(4)
            .with_d_model(8)
            .with_n_heads(2)
            .with_n_layers(1)
            .with_d_mlp(16)
            .with_dropout(0.0)
    }

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chestxray_vit_predictor_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_predict_single_image() {
        let device = Default::default();
        let dir = fixture_dir("predict");

        // Write a checkpoint to load back
        let model = tiny_config().init::<DefaultBackend>(&device);
        let checkpoint = dir.join("model");
        model
            .clone()
            .save_file(&checkpoint, &CompactRecorder::new())
            .unwrap();

        let image_path = dir.join("xray.png");
        RgbImage::new(12, 12).save(&image_path).unwrap();

        let predictor =
            Predictor::<DefaultBackend>::load(&checkpoint, &tiny_config(), &device).unwrap();
        let prediction = predictor.predict(&image_path).unwrap();

        assert!((0.0..=1.0).contains(&prediction.probability));
        assert!(prediction.label <= 1);
        assert_eq!(
            prediction.class_name,
            CLASS_NAMES[prediction.label]
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_image_is_decode_error() {
        let device = Default::default();
        let dir = fixture_dir("missing");

        let model = tiny_config().init::<DefaultBackend>(&device);
        let checkpoint = dir.join("model");
        model
            .clone()
            .save_file(&checkpoint, &CompactRecorder::new())
            .unwrap();

        let predictor =
            Predictor::<DefaultBackend>::load(&checkpoint, &tiny_config(), &device).unwrap();
        let err = predictor.predict(&dir.join("nope.png")).unwrap_err();
        assert!(matches!(err, XrayError::ImageDecode { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
