use ndarray::prelude::*;
use ndarray::{RemoveAxis, Zip};

use crate::error::{Error, Result};
use crate::topology::{Activation, LayerSpec};
use crate::{ActivationFn, Layer, Mode};

/// Applies an activation function elementwise. Describes itself by
/// annotating the stage before it.
#[derive(Debug)]
pub struct ActivationLayer<F> {
    f: F,
}

impl<F> ActivationLayer<F>
where
    F: ActivationFn,
{
    pub(crate) fn new(f: F) -> Self {
        ActivationLayer { f }
    }
}

/// Record `activation` on the last stage described so far.
///
/// Fails if that stage isn't a convolution or fully connected layer, or
/// already has an activation.
pub(crate) fn annotate(specs: &mut [LayerSpec], activation: Activation) -> Result<()> {
    let spec = specs.last_mut().ok_or_else(|| {
        Error::InvalidTopology(format!("{activation} needs a layer before it"))
    })?;
    if spec.set_activation(activation) {
        Ok(())
    } else {
        Err(Error::InvalidTopology(format!(
            "{activation} can't follow {spec}"
        )))
    }
}

impl<D, F> Layer<D> for ActivationLayer<F>
where
    D: Dimension + RemoveAxis,
    F: ActivationFn,
{
    type Output = D;

    fn output_shape(&self, input_shape: D) -> D {
        input_shape
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        annotate(specs, F::ACTIVATION)
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut<'_, f32, D>,
        _mode: Mode,
    ) {
        Zip::from(&mut y).and(&x).for_each(|y, &x| *y = self.f.f(x));
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView<'_, f32, D>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D> {
        let mut dx = dz.to_owned();
        Zip::from(&mut dx).and(&x).for_each(|d, &x| *d *= self.f.df(x));
        dx
    }
}

/// The logistic function, a handy symmetric, s-shaped function.
#[derive(Debug, Clone, Copy)]
pub struct Sigmoid;

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl ActivationFn for Sigmoid {
    const ACTIVATION: Activation = Activation::Sigmoid;

    fn f(self, x: f32) -> f32 {
        sigmoid(x)
    }

    fn df(self, x: f32) -> f32 {
        let y = sigmoid(x);
        y * (1.0 - y)
    }
}

/// Hyperbolic tangent. Like the sigmoid, but centered on zero.
#[derive(Debug, Clone, Copy)]
pub struct Tanh;

impl ActivationFn for Tanh {
    const ACTIVATION: Activation = Activation::Tanh;

    fn f(self, x: f32) -> f32 {
        x.tanh()
    }

    fn df(self, x: f32) -> f32 {
        let y = x.tanh();
        1.0 - y * y
    }
}

/// Rectified linear unit activation function.
#[derive(Debug, Clone, Copy)]
pub struct Relu;

impl ActivationFn for Relu {
    const ACTIVATION: Activation = Activation::Relu;

    fn f(self, x: f32) -> f32 {
        x.max(0.0)
    }

    fn df(self, x: f32) -> f32 {
        if x >= 0.0 {
            1.0
        } else {
            0.0
        }
    }
}
