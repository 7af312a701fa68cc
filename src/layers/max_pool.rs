//! Max pooling.

use ndarray::prelude::*;

use crate::error::Result;
use crate::topology::{LayerSpec, Padding};
use crate::{Layer, Mode};

/// Max pooling operation for image data.
///
/// The input shape is `(num_images, height, width, num_channels)`. Windows
/// of `size × size` pixels are placed every `stride` pixels with "same"
/// padding, so a partial window at the bottom or right edge still produces
/// an output pixel.
#[derive(Debug)]
pub struct MaxPool2dLayer {
    size: usize,
    stride: usize,
}

impl MaxPool2dLayer {
    pub fn new(size: usize, stride: usize) -> Self {
        assert!(size > 0 && stride > 0, "pool size and stride must be positive");
        MaxPool2dLayer { size, stride }
    }

    /// Range of input rows (or columns) covered by output row `o`.
    fn window(&self, o: usize, input: usize) -> std::ops::Range<usize> {
        let pad = Padding::Same.pad_before(input, self.size, self.stride);
        let start = (o * self.stride).saturating_sub(pad);
        let end = (o * self.stride + self.size - pad).min(input);
        start..end
    }

    /// Position of the first maximal element in each window, with its value.
    fn for_each_max<F>(&self, x: ArrayView4<'_, f32>, mut f: F)
    where
        F: FnMut([usize; 4], [usize; 4], f32),
    {
        let (xn, xh, xw, xc) = x.raw_dim().into_pattern();
        let (_, oh, ow, _) = self.output_shape(x.raw_dim()).into_pattern();
        for t in 0..xn {
            for oy in 0..oh {
                let rows = self.window(oy, xh);
                for ox in 0..ow {
                    let cols = self.window(ox, xw);
                    for c in 0..xc {
                        let mut best = (rows.start, cols.start);
                        let mut max = f32::NEG_INFINITY;
                        for y in rows.clone() {
                            for x_ in cols.clone() {
                                let v = x[[t, y, x_, c]];
                                if v > max {
                                    max = v;
                                    best = (y, x_);
                                }
                            }
                        }
                        f([t, oy, ox, c], [t, best.0, best.1, c], max);
                    }
                }
            }
        }
    }
}

impl Layer<Ix4> for MaxPool2dLayer {
    type Output = Ix4;

    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        let (xn, xh, xw, xc) = input_shape.into_pattern();
        Ix4(
            xn,
            Padding::Same.output_len(xh, self.size, self.stride),
            Padding::Same.output_len(xw, self.size, self.stride),
            xc,
        )
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        specs.push(LayerSpec::MaxPool2d {
            kernel_size: self.size,
            stride: self.stride,
        });
        Ok(())
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView4<'_, f32>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut4<'_, f32>,
        _mode: Mode,
    ) {
        self.for_each_max(x, |out, _, max| y[out] = max);
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView4<'_, f32>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView4<'_, f32>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array4<f32> {
        // ∂z/∂x is 1 at the (first) maximal element of each window and 0
        // elsewhere. Redo the forward pass to find those elements.
        let mut dx = Array4::zeros(x.raw_dim());
        self.for_each_max(x, |out, at, _| dx[at] += dz[out]);
        dx
    }
}
