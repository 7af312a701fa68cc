//! A small convolutional image classifier.
//!
//! The layer library (`layers`, `loss`, `optim`) does forward and backward
//! passes on `ndarray` arrays. [`definition`] builds the fixed two-class
//! network, [`train`] and [`predict`] are the two drivers.

mod array_util;

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::{ActivationFn, Layer, Loss, Mode};

pub mod topology;
pub use topology::{Activation, LayerSpec, Padding};

mod model;
pub use model::{EpochStats, FitOptions, History, Model};

pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod definition;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod optim;
pub mod predict;
pub mod train;

pub use dataset::Dataset;
