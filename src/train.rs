//! The training driver.

use log::info;
use ndarray::prelude::*;

use crate::config::TrainConfig;
use crate::dataset::Dataset;
use crate::definition;
use crate::error::Result;
use crate::model::{History, Model};
use crate::traits::{Layer, Loss};

/// Train the classifier from scratch as `config` says, and save it.
pub fn run(config: &TrainConfig) -> Result<History> {
    config.validate()?;
    let mut model = definition::model_with(config.objective());
    train_model(&mut model, config)
}

/// Train `model` on the images in `config.train_dir`, checking it against
/// `config.val_dir` after every epoch, then save it to `config.output`.
///
/// Images are loaded at the model's input resolution.
pub fn train_model<N, L>(model: &mut Model<N, L>, config: &TrainConfig) -> Result<History>
where
    N: Layer<Ix4, Output = Ix2>,
    L: Loss<Ix2>,
{
    config.validate()?;
    let (height, width, _) = model.input_shape();
    let classes = model.num_classes();
    let train = Dataset::load(&config.train_dir, height, width, classes)?;
    let validation = Dataset::load(&config.val_dir, height, width, classes)?;
    if train.class_names() != validation.class_names() {
        info!(
            "training classes {:?} differ from validation classes {:?}; matching them by position",
            train.class_names(),
            validation.class_names()
        );
    }

    println!("{}", model.summary());
    let history = model.fit(&train, Some(&validation), &config.fit_options())?;
    model.save(&config.output)?;
    Ok(history)
}
