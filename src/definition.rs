//! The classifier network.
//!
//! Both drivers build their model here, so training and prediction always
//! agree on the graph. Saved parameter files carry a fingerprint of the
//! topology built here; see [`crate::checkpoint`].

use ndarray::prelude::*;

use crate::layers::InputLayer;
use crate::loss::CategoricalCrossEntropyLoss;
use crate::model::Model;
use crate::optim::Objective;
use crate::topology::Padding;
use crate::traits::Layer;

pub const HEIGHT: usize = 100;
pub const WIDTH: usize = 100;
pub const CHANNELS: usize = 3;
pub const NUM_CLASSES: usize = 2;

const FILTERS: usize = 64;
const HIDDEN: usize = 1024;
const KEEP_PROB: f32 = 0.5;

/// Examples per rayon task.
const CHUNK_SIZE: usize = 8;

/// Spatial size after the three "same"-padded 2×2 pools: 100 → 50 → 25 → 13.
const POOLED: usize = 13;

/// The layers, without parameters.
pub fn network() -> impl Layer<Ix4, Output = Ix2> + Sync {
    InputLayer::new(HEIGHT, WIDTH, CHANNELS)
        .conv2d(CHANNELS, FILTERS, 3, 1, Padding::Same)
        .relu()
        .max_pool(2, 2)
        .conv2d(FILTERS, FILTERS, 3, 1, Padding::Same)
        .relu()
        .max_pool(2, 2)
        .conv2d(FILTERS, FILTERS, 3, 1, Padding::Same)
        .relu()
        .conv2d(FILTERS, FILTERS, 3, 1, Padding::Same)
        .relu()
        .conv2d(FILTERS, FILTERS, 3, 1, Padding::Same)
        .relu()
        .max_pool(2, 2)
        .flatten()
        .linear(POOLED * POOLED * FILTERS, HIDDEN)
        .tanh()
        .dropout(KEEP_PROB)
        .linear(HIDDEN, HIDDEN)
        .tanh()
        .dropout(KEEP_PROB)
        .linear(HIDDEN, NUM_CLASSES)
        .softmax()
        .parallel(CHUNK_SIZE)
}

/// A freshly initialized classifier trained with the default objective.
pub fn model() -> Model<impl Layer<Ix4, Output = Ix2> + Sync> {
    model_with(Objective::default())
}

/// A freshly initialized classifier trained with `objective`.
///
/// The objective doesn't affect the topology, so parameters saved from a
/// model built with one objective load into a model built with another.
pub fn model_with(objective: Objective) -> Model<impl Layer<Ix4, Output = Ix2> + Sync> {
    Model::new(network(), CategoricalCrossEntropyLoss, objective)
        .expect("the classifier network starts with its input layer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::OptimizerKind;
    use crate::topology::{Activation, LayerSpec};

    fn conv() -> LayerSpec {
        LayerSpec::Conv2d {
            filters: 64,
            kernel_size: 3,
            stride: 1,
            padding: Padding::Same,
            activation: Some(Activation::Relu),
        }
    }

    fn pool() -> LayerSpec {
        LayerSpec::MaxPool2d {
            kernel_size: 2,
            stride: 2,
        }
    }

    fn dense(units: usize, activation: Activation) -> LayerSpec {
        LayerSpec::FullyConnected {
            units,
            activation: Some(activation),
        }
    }

    #[test]
    fn topology() {
        let mut specs = vec![];
        network().describe(&mut specs).unwrap();
        let dropout = LayerSpec::Dropout { keep_prob: 0.5 };
        assert_eq!(
            specs,
            vec![
                LayerSpec::Input {
                    height: 100,
                    width: 100,
                    channels: 3,
                },
                conv(),
                pool(),
                conv(),
                pool(),
                conv(),
                conv(),
                conv(),
                pool(),
                dense(1024, Activation::Tanh),
                dropout.clone(),
                dense(1024, Activation::Tanh),
                dropout,
                dense(2, Activation::Softmax),
            ]
        );
    }

    #[test]
    fn shapes() {
        let net = network();
        assert_eq!(net.output_shape(Ix4(5, HEIGHT, WIDTH, CHANNELS)), Ix2(5, 2));
        let convs = 64 * 3 * 3 * 3 + 64 + 4 * (64 * 3 * 3 * 64 + 64);
        let dense = 13 * 13 * 64 * 1024 + 1024 + 1024 * 1024 + 1024 + 1024 * 2 + 2;
        assert_eq!(net.num_params(), convs + dense);
    }

    #[test]
    fn rebuilt_model_is_identical() {
        let a = model();
        let b = model_with(Objective {
            optimizer: OptimizerKind::Sgd,
            learning_rate: 0.1,
            momentum: 0.0,
        });
        assert_eq!(a.topology(), b.topology());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.input_shape(), (HEIGHT, WIDTH, CHANNELS));
        assert_eq!(a.num_classes(), NUM_CLASSES);
    }
}
