use ndarray::prelude::*;

use crate::layers::activation::annotate;
use crate::error::Result;
use crate::topology::{Activation, LayerSpec};
use crate::{Layer, Mode};

/// Layer that converts each row of the input to a probability distribution,
/// using the [softmax function](https://en.wikipedia.org/wiki/Softmax_function).
///
/// This is the last layer of a classification network.
#[derive(Debug)]
pub struct SoftmaxLayer;

fn softmax_rows(x: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut ex = x.to_owned();
    for mut row in ex.rows_mut() {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    ex
}

impl Layer<Ix2> for SoftmaxLayer {
    type Output = Ix2;

    fn output_shape(&self, input_shape: Ix2) -> Ix2 {
        input_shape
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        annotate(specs, Activation::Softmax)
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView2<'_, f32>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut2<'_, f32>,
        _mode: Mode,
    ) {
        y.assign(&softmax_rows(x));
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView2<'_, f32>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView2<'_, f32>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array2<f32> {
        // With s = softmax(x), ∂s[k]/∂x[j] = s[k] * ((j == k) - s[j]), so
        //     dx[j] = sum(dz[k] * ∂s[k]/∂x[j] for k)
        //           = s[j] * (dz[j] - sum(dz[k] * s[k] for k))
        let s = softmax_rows(x);
        let weighted = (&dz * &s).sum_axis(Axis(1));
        &s * &(&dz - &weighted.slice(s![.., NewAxis]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sum_to_one() {
        let x = array![[1.0f32, 2.0, 3.0], [1000.0, 1000.0, -1000.0]];
        let y = softmax_rows(x.view());
        for row in y.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!(y[[0, 2]] > y[[0, 1]] && y[[0, 1]] > y[[0, 0]]);
        assert_eq!(y[[1, 0]], y[[1, 1]]);
        assert!(y[[1, 2]] < 1e-30);
    }
}
