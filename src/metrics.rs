//! Turning output distributions into class predictions.

use ndarray::prelude::*;
use ndarray::Zip;

/// Index of the largest element of `v`.
///
/// Ties go to the lowest index. NaNs are never selected unless every element
/// is NaN, in which case the result is 0.
///
/// *Panics* if `v` is empty.
pub fn argmax(v: ArrayView1<'_, f32>) -> usize {
    assert!(!v.is_empty(), "argmax of an empty distribution");
    let mut best = 0;
    for (i, &x) in v.iter().enumerate().skip(1) {
        if x > v[best] || (v[best].is_nan() && !x.is_nan()) {
            best = i;
        }
    }
    best
}

/// Predicted class of each row of `yh`.
pub fn argmax_rows(yh: ArrayView2<'_, f32>) -> Array1<usize> {
    yh.rows().into_iter().map(argmax).collect()
}

/// Fraction of rows of `yh` whose argmax equals the matching entry of `y`.
pub fn accuracy(y: ArrayView1<'_, usize>, yh: ArrayView2<'_, f32>) -> f32 {
    let n = yh.nrows();
    assert_eq!(y.len(), n);
    if n == 0 {
        return 0.0;
    }
    let mut num_good = 0;
    Zip::from(y).and(yh.rows()).for_each(|&y, yh| {
        if argmax(yh) == y {
            num_good += 1;
        }
    });
    num_good as f32 / n as f32
}
