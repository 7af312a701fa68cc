//! The layer library.
//!
//! Image data has shape `(num_images, height, width, channels)`; everything
//! after the flatten layer is a `(num_examples, features)` matrix.

mod activation;
mod convolutions;
mod dropout;
mod flatten;
mod input;
mod linear;
mod max_pool;
mod parallel;
mod sequence;
mod softmax;

pub use activation::{ActivationLayer, Relu, Sigmoid, Tanh};
pub use convolutions::Conv2dLayer;
pub use dropout::DropoutLayer;
pub use flatten::FlattenLayer;
pub use input::InputLayer;
pub use linear::LinearLayer;
pub use max_pool::MaxPool2dLayer;
pub use parallel::ParallelLayer;
pub use sequence::Sequence;
pub use softmax::SoftmaxLayer;
