//! Loss functions.

use ndarray::prelude::*;
use ndarray::Zip;

use crate::metrics;
use crate::traits::Loss;

/// A loss function for classification problems.
///
/// The output `yh` of the network must be normalized e.g. by using a
/// `SoftmaxLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalCrossEntropyLoss;

/// Probabilities are clipped to this before taking the log, so a confident
/// wrong answer costs a lot but never infinity.
const EPSILON: f32 = 1e-7;

impl Loss<Ix2> for CategoricalCrossEntropyLoss {
    fn name(&self) -> &'static str {
        "categorical_crossentropy"
    }

    fn loss(&self, y: ArrayView1<'_, usize>, yh: ArrayView2<'_, f32>) -> f32 {
        let n = yh.shape()[0]; // number of examples
        let c = yh.shape()[1]; // number of categories
        assert_eq!(y.shape(), &[n]);
        assert!(y.iter().all(|&y| y < c));
        if n == 0 {
            0.0
        } else {
            let mut total = 0.0;
            Zip::from(y).and(yh.rows()).for_each(|&y, yh| {
                let p = yh[y].clamp(EPSILON, 1.0);
                total += -p.ln();
            });
            total / n as f32
        }
    }

    fn deriv(&self, y: ArrayView1<'_, usize>, yh: ArrayView2<'_, f32>) -> Array2<f32> {
        let n = yh.shape()[0]; // number of examples
        let c = yh.shape()[1]; // number of categories
        assert_eq!(y.shape(), &[n]);
        let mut dyh = Array2::<f32>::zeros((n, c));

        Zip::from(dyh.rows_mut())
            .and(y)
            .and(yh.rows())
            .for_each(|mut dyh, &y, yh| dyh[y] = -1.0 / (n as f32 * yh[y].clamp(EPSILON, 1.0)));
        dyh
    }

    fn accuracy(&self, y: ArrayView1<'_, usize>, yh: ArrayView2<'_, f32>) -> f32 {
        metrics::accuracy(y, yh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_uniform_predictions() {
        let loss = CategoricalCrossEntropyLoss;
        let y = array![1, 0];
        let perfect = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(loss.loss(y.view(), perfect.view()) < 1e-6);
        assert_eq!(loss.accuracy(y.view(), perfect.view()), 1.0);

        let uniform = array![[0.5, 0.5], [0.5, 0.5]];
        assert!((loss.loss(y.view(), uniform.view()) - 2f32.ln()).abs() < 1e-6);
        assert_eq!(loss.accuracy(y.view(), uniform.view()), 0.5);

        let d = loss.deriv(y.view(), uniform.view());
        assert_eq!(d, array![[0.0, -1.0], [-1.0, 0.0]]);
    }

    #[test]
    fn confident_mistake_is_finite() {
        let loss = CategoricalCrossEntropyLoss;
        let y = array![0];
        let yh = array![[0.0, 1.0]];
        let l = loss.loss(y.view(), yh.view());
        assert!(l.is_finite() && l > 10.0);
    }
}
