//! Viewing rows of the hidden-activation buffer as higher-dimensional arrays.
//!
//! The buffer has one row per example. A layer that stores, say, an image per
//! example takes a block of columns and splits it into `(height, width,
//! channels)`. A column block is generally not contiguous, so `into_shape`
//! won't do; we compute the strides ourselves instead.

use ndarray::prelude::*;
use ndarray::ShapeBuilder;

fn row_split_strides<D: Dimension>(rows: usize, cols: usize, strides: &[isize], shape: &D) -> D {
    assert_eq!(
        shape[0], rows,
        "cannot view {rows} rows as shape {shape:?}: row counts differ"
    );
    assert_eq!(
        shape.size(),
        rows * cols,
        "cannot view a {rows}x{cols} block as shape {shape:?}"
    );

    let mut out = D::zeros(shape.ndim());
    out[0] = strides[0] as usize;
    let mut step = strides[1];
    for axis in (1..shape.ndim()).rev() {
        out[axis] = step as usize;
        step *= shape[axis] as isize;
    }
    out
}

/// View each row of `view` as one element along axis 0 of `shape`.
///
/// `shape[0]` must equal the number of rows, and the remaining axes must hold
/// exactly one row's worth of elements, in "C" order.
///
/// *Panics* if the shapes don't agree.
pub fn rows_as<'a, D: Dimension>(view: ArrayView2<'a, f32>, shape: D) -> ArrayView<'a, f32, D> {
    let (rows, cols) = view.dim();
    let strides = row_split_strides(rows, cols, view.strides(), &shape);
    // SAFETY: every index of `shape` maps onto a distinct element of `view`,
    // computed from the view's own strides.
    unsafe { ArrayView::from_shape_ptr(shape.strides(strides), view.as_ptr()) }
}

/// Mutable version of [`rows_as`].
pub fn rows_as_mut<'a, D: Dimension>(
    mut view: ArrayViewMut2<'a, f32>,
    shape: D,
) -> ArrayViewMut<'a, f32, D> {
    let (rows, cols) = view.dim();
    let strides = row_split_strides(rows, cols, view.strides(), &shape);
    let ptr = view.as_mut_ptr();
    // SAFETY: as above; `view` is consumed, so the new view is the only one.
    unsafe { ArrayViewMut::from_shape_ptr(shape.strides(strides), ptr) }
}
