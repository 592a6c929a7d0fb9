//! Chest X-ray Vision Transformer CLI
//!
//! Entry point for training, evaluating, and running inference with the
//! chest X-ray pneumonia classifier built on the Burn framework.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use chestxray_vit::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use chestxray_vit::dataset::batch::{BatchLoader, XrayBatcher, XrayBurnDataset};
use chestxray_vit::dataset::loader::{ChestXrayDataset, Split};
use chestxray_vit::dataset::transform::Preprocessor;
use chestxray_vit::inference::Predictor;
use chestxray_vit::model::config::{TrainingConfig, ValidationCadence};
use chestxray_vit::model::vit::ViTConfig;
use chestxray_vit::training::evaluate::evaluate;
use chestxray_vit::training::trainer::{
    checkpoint_path, load_checkpoint, train, BEST_CHECKPOINT, LAST_CHECKPOINT,
};
use chestxray_vit::utils::error::XrayError;
use chestxray_vit::utils::logging::{init_logging, LogConfig};
use chestxray_vit::IMAGE_SIZE;

/// Chest X-Ray Pneumonia Classification with a Vision Transformer
#[derive(Parser, Debug)]
#[command(name = "chestxray_vit")]
#[command(version)]
#[command(about = "Vision Transformer training and evaluation for chest X-ray screening", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the model and evaluate the resulting checkpoints on the test split
    Train {
        /// Path to the dataset root (containing train/, val/, test/)
        #[arg(short, long, default_value = "data/chest_xray")]
        data_dir: PathBuf,

        /// Directory receiving the run output (a timestamped subdirectory is created)
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value = "300")]
        epochs: usize,

        /// Training batch size
        #[arg(long, default_value = "256")]
        train_batch_size: usize,

        /// Validation batch size
        #[arg(long, default_value = "16")]
        val_batch_size: usize,

        /// Test batch size
        #[arg(long, default_value = "16")]
        test_batch_size: usize,

        /// AdamW learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// AdamW weight decay
        #[arg(long, default_value = "0.01")]
        weight_decay: f32,

        /// Random seed for shuffling, augmentation, and parameter init
        #[arg(long, default_value = "3")]
        seed: u64,

        /// When to run validation: per-epoch or per-batch
        #[arg(long, default_value = "per-epoch")]
        validation_cadence: ValidationCadence,

        /// Apply the step-decay LR schedule each epoch (step=10, gamma=0.1)
        #[arg(long, default_value = "false")]
        step_lr: bool,

        /// Use the random crop instead of a plain resize for val/test images
        #[arg(long, default_value = "false")]
        eval_random_crop: bool,
    },

    /// Evaluate a saved checkpoint on a dataset split
    Evaluate {
        /// Path to the dataset root
        #[arg(short, long, default_value = "data/chest_xray")]
        data_dir: PathBuf,

        /// Path to the model checkpoint
        #[arg(short, long)]
        model: PathBuf,

        /// Split to evaluate on
        #[arg(short, long, default_value = "test")]
        split: Split,

        /// Batch size
        #[arg(short, long, default_value = "16")]
        batch_size: usize,
    },

    /// Predict the class of a single image
    Predict {
        /// Path to the model checkpoint
        #[arg(short, long)]
        model: PathBuf,

        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show dataset statistics for every split
    Stats {
        /// Path to the dataset root
        #[arg(short, long, default_value = "data/chest_xray")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    println!(
        "{}",
        "Chest X-Ray ViT: pneumonia screening with Burn + Rust"
            .green()
            .bold()
    );
    println!("  Backend: {}", backend_name());
    println!();

    match cli.command {
        Commands::Train {
            data_dir,
            output_dir,
            epochs,
            train_batch_size,
            val_batch_size,
            test_batch_size,
            learning_rate,
            weight_decay,
            seed,
            validation_cadence,
            step_lr,
            eval_random_crop,
        } => {
            let run_dir = output_dir.join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S")));
            let config = TrainingConfig {
                epochs,
                train_batch_size,
                val_batch_size,
                test_batch_size,
                learning_rate,
                weight_decay,
                validation_cadence,
                step_lr_each_epoch: step_lr,
                eval_random_crop,
                seed,
                output_dir: run_dir,
                ..Default::default()
            };
            cmd_train(&data_dir, config)
        }

        Commands::Evaluate {
            data_dir,
            model,
            split,
            batch_size,
        } => cmd_evaluate(&data_dir, &model, split, batch_size),

        Commands::Predict { model, input } => cmd_predict(&model, &input),

        Commands::Stats { data_dir } => cmd_stats(&data_dir),
    }
}

fn cmd_train(data_dir: &Path, config: TrainingConfig) -> Result<()> {
    let device = default_device();

    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Data directory:   {:?}", data_dir);
    println!("  Output directory: {:?}", config.output_dir);
    println!("  Epochs:           {}", config.epochs);
    println!("  Batch size:       {}", config.train_batch_size);
    println!("  Learning rate:    {}", config.learning_rate);
    println!("  Validation:       {}", config.validation_cadence);
    println!("  Seed:             {}", config.seed);
    println!();

    let train_ds = ChestXrayDataset::open(data_dir, Split::Train)?;
    train_ds.stats().log();

    let val_ds = match ChestXrayDataset::open(data_dir, Split::Val) {
        Ok(ds) => {
            ds.stats().log();
            Some(ds)
        }
        Err(XrayError::SplitNotFound(path)) | Err(XrayError::EmptyDataset(path)) => {
            warn!("no validation data at {:?}, training without validation", path);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let train_set = XrayBurnDataset::new(&train_ds, Preprocessor::train(IMAGE_SIZE, config.seed));
    let val_set = val_ds.as_ref().map(|ds| {
        XrayBurnDataset::new(
            ds,
            Preprocessor::eval(IMAGE_SIZE, config.seed, config.eval_random_crop),
        )
    });

    let batcher = XrayBatcher::new();
    let model = ViTConfig::new().init::<TrainingBackend>(&device);

    train(
        model,
        &train_set,
        val_set.as_ref(),
        &batcher,
        &config,
        &device,
    )?;

    // Held-out evaluation of both surviving checkpoints
    match ChestXrayDataset::open(data_dir, Split::Test) {
        Ok(test_ds) => {
            test_ds.stats().log();
            let test_set = XrayBurnDataset::new(
                &test_ds,
                Preprocessor::eval(IMAGE_SIZE, config.seed, config.eval_random_crop),
            );
            let test_loader = BatchLoader::new(config.test_batch_size, false, config.seed);

            for (tag, stem) in [("last", LAST_CHECKPOINT), ("best", BEST_CHECKPOINT)] {
                let stem_path = checkpoint_path(&config.output_dir, stem);
                if !stem_path.with_extension("mpk").is_file() {
                    continue;
                }
                let model = ViTConfig::new().init::<DefaultBackend>(&device);
                let model = load_checkpoint(model, &stem_path, &device)?;
                let report = evaluate(&model, &test_set, &test_loader, &batcher, &device);
                report.log(&format!("test ({} checkpoint)", tag));
            }
        }
        Err(e) => warn!("skipping test evaluation: {}", e),
    }

    Ok(())
}

fn cmd_evaluate(data_dir: &Path, model_path: &Path, split: Split, batch_size: usize) -> Result<()> {
    let device = default_device();

    let dataset = ChestXrayDataset::open(data_dir, split)?;
    dataset.stats().log();
    let set = XrayBurnDataset::new(&dataset, Preprocessor::eval(IMAGE_SIZE, 0, false));
    let loader = BatchLoader::new(batch_size, false, 0);

    let model = ViTConfig::new().init::<DefaultBackend>(&device);
    let model = load_checkpoint(model, &checkpoint_stem(model_path), &device)?;

    let report = evaluate(&model, &set, &loader, &XrayBatcher::new(), &device);
    report.log(&format!("{} split", split));

    Ok(())
}

fn cmd_predict(model_path: &Path, input: &Path) -> Result<()> {
    let device = default_device();

    let predictor =
        Predictor::<DefaultBackend>::load(&checkpoint_stem(model_path), &ViTConfig::new(), &device)?;
    let prediction = predictor.predict(input)?;

    println!(
        "{} {} (p = {:.4}, {:.1} ms)",
        "Prediction:".cyan().bold(),
        prediction.class_name,
        prediction.probability,
        prediction.inference_time_ms,
    );

    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    for split in Split::all() {
        match ChestXrayDataset::open(data_dir, split) {
            Ok(dataset) => dataset.stats().log(),
            Err(e) => warn!("{} split unavailable: {}", split, e),
        }
    }
    Ok(())
}

/// Accept checkpoint paths with or without the recorder's `.mpk` extension
fn checkpoint_stem(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "mpk") {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}
