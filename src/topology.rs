//! Declarative description of a network.
//!
//! Every layer can describe itself as a [`LayerSpec`]. The ordered list of
//! specs is the network's topology. It is printed before training and stored,
//! together with its [`fingerprint`], in every saved model file so that a
//! parameter file is never loaded into a network it doesn't fit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named element-wise (or row-wise, for softmax) nonlinearity attached to a
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

impl Activation {
    pub fn name(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How convolution and pooling windows treat the image border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Padding {
    /// Pad with zeros so the output is `ceil(input / stride)` pixels.
    Same,
    /// No padding; windows stay entirely inside the input.
    Valid,
}

impl Padding {
    /// Output length along one axis, for an input of length `input`.
    pub fn output_len(self, input: usize, kernel: usize, stride: usize) -> usize {
        match self {
            Padding::Same => (input + stride - 1) / stride,
            Padding::Valid => {
                assert!(
                    input >= kernel,
                    "input of length {input} is smaller than kernel of size {kernel}"
                );
                (input - kernel) / stride + 1
            }
        }
    }

    /// Number of padding elements before the first input element.
    ///
    /// For `Same`, the total padding is split with the smaller half first.
    pub fn pad_before(self, input: usize, kernel: usize, stride: usize) -> usize {
        match self {
            Padding::Same => {
                let output = self.output_len(input, kernel, stride);
                let needed = (output - 1) * stride + kernel;
                needed.saturating_sub(input) / 2
            }
            Padding::Valid => 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Padding::Same => "same",
            Padding::Valid => "valid",
        }
    }
}

/// One stage of the computation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerSpec {
    Input {
        height: usize,
        width: usize,
        channels: usize,
    },
    Conv2d {
        filters: usize,
        kernel_size: usize,
        stride: usize,
        padding: Padding,
        activation: Option<Activation>,
    },
    MaxPool2d {
        kernel_size: usize,
        stride: usize,
    },
    FullyConnected {
        units: usize,
        activation: Option<Activation>,
    },
    Dropout {
        keep_prob: f32,
    },
}

impl LayerSpec {
    /// Attach an activation to this stage. Returns false if the stage can't
    /// carry one or already has one.
    pub(crate) fn set_activation(&mut self, f: Activation) -> bool {
        match self {
            LayerSpec::Conv2d { activation, .. } | LayerSpec::FullyConnected { activation, .. }
                if activation.is_none() =>
            {
                *activation = Some(f);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn act(activation: &Option<Activation>) -> &'static str {
            activation.map_or("linear", Activation::name)
        }

        match self {
            LayerSpec::Input {
                height,
                width,
                channels,
            } => write!(f, "input_data(shape=[None, {height}, {width}, {channels}])"),
            LayerSpec::Conv2d {
                filters,
                kernel_size,
                stride,
                padding,
                activation,
            } => write!(
                f,
                "conv_2d({filters}, {kernel_size}, strides={stride}, padding={}, activation={})",
                padding.name(),
                act(activation)
            ),
            LayerSpec::MaxPool2d {
                kernel_size,
                stride,
            } => write!(f, "max_pool_2d({kernel_size}, strides={stride})"),
            LayerSpec::FullyConnected { units, activation } => {
                write!(f, "fully_connected({units}, activation={})", act(activation))
            }
            LayerSpec::Dropout { keep_prob } => write!(f, "dropout({keep_prob})"),
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit hash of a topology.
///
/// This is FNV-1a over the bincode encoding of the spec list, so it only
/// depends on the stages, their order and their attributes.
pub fn fingerprint(specs: &[LayerSpec]) -> u64 {
    let bytes = bincode::serialize(specs).expect("layer specs always serialize");
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(filters: usize) -> LayerSpec {
        LayerSpec::Conv2d {
            filters,
            kernel_size: 3,
            stride: 1,
            padding: Padding::Same,
            activation: Some(Activation::Relu),
        }
    }

    #[test]
    fn same_padding_sizes() {
        assert_eq!(Padding::Same.output_len(100, 2, 2), 50);
        assert_eq!(Padding::Same.output_len(25, 2, 2), 13);
        assert_eq!(Padding::Same.output_len(7, 3, 1), 7);
        assert_eq!(Padding::Same.pad_before(7, 3, 1), 1);
        // 25 -> 13 with a 2x2 window needs one extra column, all of it at the end
        assert_eq!(Padding::Same.pad_before(25, 2, 2), 0);
        assert_eq!(Padding::Valid.output_len(6, 3, 1), 4);
        assert_eq!(Padding::Valid.output_len(7, 3, 2), 3);
    }

    #[test]
    fn fingerprint_depends_on_order_and_attributes() {
        let pool = LayerSpec::MaxPool2d {
            kernel_size: 2,
            stride: 2,
        };
        let a = vec![conv(64), pool.clone()];
        let b = vec![pool, conv(64)];
        let c = vec![conv(32), LayerSpec::MaxPool2d { kernel_size: 2, stride: 2 }];

        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn activation_attaches_once() {
        let mut spec = LayerSpec::FullyConnected {
            units: 2,
            activation: None,
        };
        assert!(spec.set_activation(Activation::Softmax));
        assert!(!spec.set_activation(Activation::Relu));
        assert_eq!(spec.to_string(), "fully_connected(2, activation=softmax)");

        let mut pool = LayerSpec::MaxPool2d {
            kernel_size: 2,
            stride: 2,
        };
        assert!(!pool.set_activation(Activation::Relu));
    }
}
