//! Command-line configuration for the two drivers.
//!
//! Every default matches the value the classifier was originally built with,
//! so running either binary with no arguments behaves the same as before.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::model::FitOptions;
use crate::optim::{Objective, OptimizerKind};

pub const DEFAULT_TRAIN_DIR: &str = "./train";
pub const DEFAULT_VAL_DIR: &str = "./validate";
pub const DEFAULT_MODEL_PATH: &str = "ZtrainedNet/final-model.bin";

#[derive(Debug, Clone, Parser)]
#[command(about = "Train the two-class image classifier", long_about = None)]
pub struct TrainConfig {
    /// Training images, one subdirectory per class
    #[arg(long = "train-dir", value_name = "DIR", default_value = DEFAULT_TRAIN_DIR)]
    pub train_dir: PathBuf,

    /// Validation images, evaluated after every epoch
    #[arg(long = "val-dir", value_name = "DIR", default_value = DEFAULT_VAL_DIR)]
    pub val_dir: PathBuf,

    /// Save the trained parameters to FILE
    #[arg(long = "output", value_name = "FILE", default_value = DEFAULT_MODEL_PATH)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 250)]
    pub epochs: usize,

    #[arg(long = "learning-rate", default_value_t = 0.001)]
    pub learning_rate: f32,

    /// Number of examples per gradient step
    #[arg(long = "batch-size", value_name = "N", default_value_t = 64)]
    pub batch_size: usize,

    /// Momentum coefficient; ignored by sgd
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f32,

    #[arg(long, value_enum, default_value_t = OptimizerKind::Momentum)]
    pub optimizer: OptimizerKind,

    /// Visit the training examples in the same order every epoch
    #[arg(long = "no-shuffle")]
    pub no_shuffle: bool,

    /// Seed the shuffle order, for reproducible runs
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig::parse_from(["train"])
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be a positive number, not {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(Error::InvalidConfig(format!(
                "momentum must be in [0, 1), not {}",
                self.momentum
            )));
        }
        Ok(())
    }

    pub fn objective(&self) -> Objective {
        Objective {
            optimizer: self.optimizer,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            shuffle: !self.no_shuffle,
            seed: self.seed,
            ..FitOptions::default()
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(about = "Check a trained classifier against the validation images", long_about = None)]
pub struct PredictConfig {
    /// Parameters saved by `train`
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    #[arg(long = "val-dir", value_name = "DIR", default_value = DEFAULT_VAL_DIR)]
    pub val_dir: PathBuf,
}

impl Default for PredictConfig {
    fn default() -> Self {
        PredictConfig::parse_from(["predict"])
    }
}
