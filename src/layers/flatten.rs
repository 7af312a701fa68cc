use ndarray::prelude::*;
use ndarray::RemoveAxis;

use crate::{Layer, Mode};

/// Flatten a shape from n-dimensional to 2-dimensional.
///
/// Axis 0, the mini-batch axis, is retained.
pub(crate) fn flatten<D: RemoveAxis>(shape: D) -> Ix2 {
    Ix2(shape[0], shape.remove_axis(Axis(0)).size())
}

/// Reshape inputs to matrix form.
///
/// This layer takes inputs with example-index as the first axis and any number
/// of other axes. It flattens each example into a row, leaving a 2D matrix of
/// shape `(num_examples, features)`.
///
/// Fully connected layers in a topology imply this step, so it describes
/// nothing.
#[derive(Debug)]
pub struct FlattenLayer;

impl<D: Dimension + RemoveAxis> Layer<D> for FlattenLayer {
    type Output = Ix2;

    fn output_shape(&self, input_shape: D) -> Ix2 {
        flatten(input_shape)
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut2<'_, f32>,
        _mode: Mode,
    ) {
        assert_eq!(x.len(), y.len());
        for (x, y) in x.iter().copied().zip(y.iter_mut()) {
            *y = x;
        }
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView2<'_, f32>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D> {
        Array::from_shape_vec(x.raw_dim(), dz.iter().copied().collect())
            .expect("dz should have one row per example of x")
    }
}
