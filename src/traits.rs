use std::fmt::Debug;

use ndarray::prelude::*;
use ndarray::RemoveAxis;
use rand::rngs::StdRng;

use crate::layers::{
    ActivationLayer, Conv2dLayer, DropoutLayer, FlattenLayer, LinearLayer, MaxPool2dLayer,
    ParallelLayer, Relu, Sequence, Sigmoid, SoftmaxLayer, Tanh,
};
use crate::error::Result;
use crate::topology::{LayerSpec, Padding};

/// Whether a forward pass is part of training.
///
/// Layers like dropout behave differently while training; everything else
/// ignores this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Infer,
}

pub trait Layer<D>: Debug
where
    D: Dimension,
{
    /// Type of the output shape, typically one of `Ix1`, `Ix2`, etc.
    ///
    /// Axis 0 of this is always the mini-batch axis.
    type Output: Dimension + RemoveAxis;

    /// For input of the given shape, compute the output shape.
    ///
    /// Axis 0 of both `input_shape` and `output_shape` is the mini-batch axis.
    fn output_shape(&self, input_shape: D) -> Self::Output;

    /// Number of parameters required for this layer.
    ///
    /// The caller provides parameters to the other methods as a single flat
    /// array, which the methods will slice up and reshape into whatever they
    /// need.
    fn num_params(&self) -> usize {
        0
    }

    /// Fill `params` with starting values. `params` is zeroed on entry; the
    /// default leaves it that way.
    fn init_params(&self, _params: ArrayViewMut1<'_, f32>, _rng: &mut StdRng) {}

    /// Amount of temporary space this layer needs for hidden activations.
    ///
    /// During training, to avoid redoing work during backpropagation, we have to save
    /// the output of some layers. Currently we (wastefully) save it *all*. This method
    /// is used to set aside a big buffer for that data at the start of each batch.
    ///
    /// Row `i` of the buffer belongs to example `i`.
    fn hidden_activations_shape(&self, input_shape: D) -> Ix2 {
        Ix2(input_shape[0], 0)
    }

    /// Append a description of this layer to `specs`.
    ///
    /// Flattening is implied by the stage after it, so it adds nothing.
    /// Activation layers annotate the previous stage, and fail with
    /// `Error::InvalidTopology` if it can't take an activation.
    fn describe(&self, _specs: &mut Vec<LayerSpec>) -> Result<()> {
        Ok(())
    }

    /// Compute the output of this layer, given the `params` and the input `x`.
    /// Store the output in `y` and store the output of all hidden layers in `tmp`.
    ///
    /// Axis 0 of `x` is always the mini-batch axis; that is, each `x[i]` is a
    /// single training example or prediction task.
    fn apply(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayViewMut2<'_, f32>,
        y: ArrayViewMut<'_, f32, Self::Output>,
        mode: Mode,
    );

    /// Given x and ∂L/∂z at x, compute partial derivatives ∂L/∂x and ∂L/∂p.
    ///
    /// Store ∂L/∂p in the out-param `dp`, a 1D vector of derivatives. Return
    /// ∂L/∂x.
    ///
    /// A step in backpropagation. `tmp` holds whatever the preceding call to
    /// `apply` stored there.
    fn derivatives(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayView2<'_, f32>,
        dz: ArrayView<'_, f32, Self::Output>,
        dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D>;

    fn then<L2>(self, other: L2) -> Sequence<Self, L2>
    where
        Self: Sized,
        L2: Layer<Self::Output>,
    {
        Sequence::new(self, other)
    }

    fn relu(self) -> Sequence<Self, ActivationLayer<Relu>>
    where
        Self: Sized,
    {
        self.then(ActivationLayer::new(Relu))
    }

    fn tanh(self) -> Sequence<Self, ActivationLayer<Tanh>>
    where
        Self: Sized,
    {
        self.then(ActivationLayer::new(Tanh))
    }

    fn sigmoid(self) -> Sequence<Self, ActivationLayer<Sigmoid>>
    where
        Self: Sized,
    {
        self.then(ActivationLayer::new(Sigmoid))
    }

    /// 2D convolution with `filters` square kernels of size `kernel_size`.
    fn conv2d(
        self,
        in_channels: usize,
        filters: usize,
        kernel_size: usize,
        stride: usize,
        padding: Padding,
    ) -> Sequence<Self, Conv2dLayer>
    where
        Self: Sized + Layer<D, Output = Ix4>,
    {
        self.then(Conv2dLayer::new(
            Ix4(filters, kernel_size, kernel_size, in_channels),
            stride,
            padding,
        ))
    }

    fn max_pool(self, kernel_size: usize, stride: usize) -> Sequence<Self, MaxPool2dLayer>
    where
        Self: Sized + Layer<D, Output = Ix4>,
    {
        self.then(MaxPool2dLayer::new(kernel_size, stride))
    }

    fn flatten(self) -> Sequence<Self, FlattenLayer>
    where
        Self: Sized,
    {
        self.then(FlattenLayer)
    }

    /// Fully connected layer, with one bias per output.
    fn linear(self, num_inputs: usize, num_outputs: usize) -> Sequence<Self, LinearLayer>
    where
        Self: Sized + Layer<D, Output = Ix2>,
    {
        self.then(LinearLayer::new(num_inputs, num_outputs))
    }

    fn softmax(self) -> Sequence<Self, SoftmaxLayer>
    where
        Self: Sized + Layer<D, Output = Ix2>,
    {
        Sequence::new(self, SoftmaxLayer)
    }

    fn dropout(self, keep_prob: f32) -> Sequence<Self, DropoutLayer>
    where
        Self: Sized,
    {
        self.then(DropoutLayer::new(keep_prob))
    }

    /// Split each mini-batch into chunks of `chunk_size` examples and process
    /// them on the rayon thread pool.
    fn parallel(self, chunk_size: usize) -> ParallelLayer<Self>
    where
        Self: Sized,
    {
        ParallelLayer::new(self, chunk_size)
    }
}

pub trait Loss<D: Dimension>: Debug {
    /// Name shown in the model summary.
    fn name(&self) -> &'static str;

    /// Mean loss over the batch. `y[i]` is the class index of example `i`.
    fn loss(&self, y: ArrayView1<'_, usize>, yh: ArrayView<'_, f32, D>) -> f32;
    fn accuracy(&self, y: ArrayView1<'_, usize>, yh: ArrayView<'_, f32, D>) -> f32;
    fn deriv(&self, y: ArrayView1<'_, usize>, yh: ArrayView<'_, f32, D>) -> Array<f32, D>;
}

pub trait ActivationFn: Copy + Clone + Debug {
    /// The name recorded in the network topology.
    const ACTIVATION: crate::topology::Activation;

    fn f(self, x: f32) -> f32;
    fn df(self, x: f32) -> f32;
}
