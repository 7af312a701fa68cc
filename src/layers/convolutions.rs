//! Convolutions for image processing.
//!
//! Convolution layers take input of the shape `(num_images, img_height, img_width, num_img_channels)`.
//!
//! Convolution kernels have the shape `(num_output_channels, ker_height, ker_width, num_img_channels)`.
//!
//! Each image is unrolled into a matrix of patches ("im2col"), one row per
//! output pixel, so the convolution itself is a single matrix product.

use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

use crate::error::Result;
use crate::topology::{LayerSpec, Padding};
use crate::{Layer, Mode};

/// Where the kernel windows fall on an image of a particular size.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    pad_top: usize,
    pad_left: usize,
}

/// 2D convolution.
///
/// In addition to the convolution kernel, each output channel gets a bias, a
/// constant added to each pixel of that channel.
#[derive(Debug)]
pub struct Conv2dLayer {
    kernel_shape: Ix4,
    stride: usize,
    padding: Padding,
}

impl Conv2dLayer {
    /// Create a convolutional layer.
    ///
    /// kernel_shape must be (num_output_channels, height, width, num_img_channels).
    ///
    /// For example, to use 64 3x3 filters on an RGB image,
    /// use `(64, 3, 3, 3)`.
    pub fn new(kernel_shape: Ix4, stride: usize, padding: Padding) -> Self {
        let (_, kh, kw, _) = kernel_shape.into_pattern();
        assert_eq!(kh, kw, "only square kernels are supported");
        assert!(stride > 0, "stride must be positive");
        Conv2dLayer {
            kernel_shape,
            stride,
            padding,
        }
    }

    fn geometry(&self, in_h: usize, in_w: usize) -> Geometry {
        let (_, kh, kw, _) = self.kernel_shape.into_pattern();
        let s = self.stride;
        Geometry {
            in_h,
            in_w,
            out_h: self.padding.output_len(in_h, kh, s),
            out_w: self.padding.output_len(in_w, kw, s),
            pad_top: self.padding.pad_before(in_h, kh, s),
            pad_left: self.padding.pad_before(in_w, kw, s),
        }
    }

    /// Input pixel under kernel offset `(ky, kx)` of output pixel `(oy, ox)`,
    /// or `None` if it falls in the padding.
    fn source(&self, g: &Geometry, oy: usize, ox: usize, ky: usize, kx: usize) -> Option<(usize, usize)> {
        let y = (oy * self.stride + ky).checked_sub(g.pad_top)?;
        let x = (ox * self.stride + kx).checked_sub(g.pad_left)?;
        (y < g.in_h && x < g.in_w).then_some((y, x))
    }

    /// Unroll one `(height, width, channels)` image into a matrix with one
    /// row per output pixel and one column per kernel element.
    fn im2col(&self, image: ArrayView3<'_, f32>, g: &Geometry) -> Array2<f32> {
        let (_, kh, kw, kc) = self.kernel_shape.into_pattern();
        let mut cols = Array2::zeros((g.out_h * g.out_w, kh * kw * kc));
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                let mut row = cols.row_mut(oy * g.out_w + ox);
                for ky in 0..kh {
                    for kx in 0..kw {
                        if let Some((y, x)) = self.source(g, oy, ox, ky, kx) {
                            let k = (ky * kw + kx) * kc;
                            row.slice_mut(s![k..k + kc])
                                .assign(&image.slice(s![y, x, ..]));
                        }
                    }
                }
            }
        }
        cols
    }

    /// Inverse of `im2col`: add each patch element back onto the pixel it
    /// came from.
    fn col2im(&self, cols: ArrayView2<'_, f32>, g: &Geometry, mut image: ArrayViewMut3<'_, f32>) {
        let (_, kh, kw, kc) = self.kernel_shape.into_pattern();
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                let row = cols.row(oy * g.out_w + ox);
                for ky in 0..kh {
                    for kx in 0..kw {
                        if let Some((y, x)) = self.source(g, oy, ox, ky, kx) {
                            let k = (ky * kw + kx) * kc;
                            let mut pixel = image.slice_mut(s![y, x, ..]);
                            pixel += &row.slice(s![k..k + kc]);
                        }
                    }
                }
            }
        }
    }

    /// Split `params` into the kernel, as a `(filters, kh * kw * channels)`
    /// matrix, and the biases.
    fn split_params<'a>(&self, params: ArrayView1<'a, f32>) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        let (oc, kh, kw, ic) = self.kernel_shape.into_pattern();
        let (kernel, bias) = params.split_at(Axis(0), self.kernel_shape.size());
        let kernel = kernel
            .into_shape((oc, kh * kw * ic))
            .expect("params must be contiguous");
        (kernel, bias)
    }
}

impl Layer<Ix4> for Conv2dLayer {
    type Output = Ix4;

    fn output_shape(&self, input_shape: Ix4) -> Self::Output {
        let (xn, xh, xw, xc) = input_shape.into_pattern();
        let (oc, _, _, ic) = self.kernel_shape.into_pattern();
        assert_eq!(ic, xc, "incompatible number of channels: images={xc}, kernel={ic}");
        let g = self.geometry(xh, xw);
        Ix4(xn, g.out_h, g.out_w, oc)
    }

    fn num_params(&self) -> usize {
        let (oc, kh, kw, ic) = self.kernel_shape.into_pattern();
        oc * kh * kw * ic + oc
    }

    fn init_params(&self, params: ArrayViewMut1<'_, f32>, rng: &mut StdRng) {
        let (_, kh, kw, ic) = self.kernel_shape.into_pattern();
        let ks = self.kernel_shape.size();
        let scale = 1.0 / ((kh * kw * ic) as f32).sqrt();
        let (mut kernel, mut bias) = params.split_at(Axis(0), ks);
        kernel.assign(&(scale * Array1::<f32>::random_using(ks, StandardNormal, rng)));
        bias.fill(0.0);
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        let (oc, kh, _, _) = self.kernel_shape.into_pattern();
        specs.push(LayerSpec::Conv2d {
            filters: oc,
            kernel_size: kh,
            stride: self.stride,
            padding: self.padding,
            activation: None,
        });
        Ok(())
    }

    fn apply(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView4<'_, f32>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut4<'_, f32>,
        _mode: Mode,
    ) {
        let (_, xh, xw, _) = x.raw_dim().into_pattern();
        let g = self.geometry(xh, xw);
        let oc = self.kernel_shape[0];
        let (kernel, bias) = self.split_params(params);

        for (image, mut out) in x.outer_iter().zip(y.outer_iter_mut()) {
            let cols = self.im2col(image, &g);
            let z = cols.dot(&kernel.t()) + &bias;
            out.assign(
                &z.into_shape((g.out_h, g.out_w, oc))
                    .expect("one row per output pixel"),
            );
        }
    }

    fn derivatives(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView4<'_, f32>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView4<'_, f32>,
        mut dp: ArrayViewMut1<'_, f32>,
    ) -> Array4<f32> {
        let (_, xh, xw, _) = x.raw_dim().into_pattern();
        let g = self.geometry(xh, xw);
        let oc = self.kernel_shape[0];
        let (kernel, _) = self.split_params(params);

        let mut dk = Array2::<f32>::zeros(kernel.raw_dim());
        let mut db = Array1::<f32>::zeros(oc);
        let mut dx = Array4::zeros(x.raw_dim());
        for ((image, dz), dimage) in x.outer_iter().zip(dz.outer_iter()).zip(dx.outer_iter_mut()) {
            let cols = self.im2col(image, &g);
            let dz = dz
                .to_owned()
                .into_shape((g.out_h * g.out_w, oc))
                .expect("dz should match output_shape");
            dk += &dz.t().dot(&cols);
            db += &dz.sum_axis(Axis(0));
            self.col2im(dz.dot(&kernel).view(), &g, dimage);
        }

        let ks = self.kernel_shape.size();
        dp.slice_mut(s![..ks])
            .assign(&dk.into_shape(ks).expect("dk is contiguous"));
        dp.slice_mut(s![ks..]).assign(&db);
        dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct (slow) convolution to check the im2col version against.
    fn naive(layer: &Conv2dLayer, params: ArrayView1<f32>, x: ArrayView4<f32>) -> Array4<f32> {
        let (oc, kh, kw, ic) = layer.kernel_shape.into_pattern();
        let (_, xh, xw, _) = x.raw_dim().into_pattern();
        let g = layer.geometry(xh, xw);
        let kernel = params
            .slice(s![..layer.kernel_shape.size()])
            .into_shape(layer.kernel_shape)
            .unwrap();
        let bias = params.slice(s![layer.kernel_shape.size()..]);
        let mut z = Array4::zeros(layer.output_shape(x.raw_dim()));
        for t in 0..x.len_of(Axis(0)) {
            for oy in 0..g.out_h {
                for ox in 0..g.out_w {
                    for o in 0..oc {
                        let mut acc = bias[o];
                        for ky in 0..kh {
                            for kx in 0..kw {
                                if let Some((y, x_)) = layer.source(&g, oy, ox, ky, kx) {
                                    for c in 0..ic {
                                        acc += kernel[[o, ky, kx, c]] * x[[t, y, x_, c]];
                                    }
                                }
                            }
                        }
                        z[[t, oy, ox, o]] = acc;
                    }
                }
            }
        }
        z
    }

    #[test]
    fn matches_direct_convolution() {
        for (stride, padding) in [(1, Padding::Same), (2, Padding::Same), (1, Padding::Valid), (2, Padding::Valid)] {
            let layer = Conv2dLayer::new(Ix4(3, 3, 3, 2), stride, padding);
            let params = Array1::from_shape_fn(layer.num_params(), |i| ((i * 7) % 11) as f32 * 0.1 - 0.5);
            let x = Array4::from_shape_fn((2, 5, 6, 2), |(t, y, x, c)| (t + 2 * y + 3 * x + 5 * c) as f32 * 0.05);

            let mut y = Array4::zeros(layer.output_shape(x.raw_dim()));
            let mut tmp = Array2::zeros((2, 0));
            layer.apply(params.view(), x.view(), tmp.view_mut(), y.view_mut(), Mode::Infer);

            let expected = naive(&layer, params.view(), x.view());
            assert_eq!(y.shape(), expected.shape());
            for (a, b) in y.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-4, "{a} != {b} (stride {stride}, {padding:?})");
            }
        }
    }

    #[test]
    fn same_padding_keeps_size() {
        let layer = Conv2dLayer::new(Ix4(64, 3, 3, 3), 1, Padding::Same);
        assert_eq!(layer.output_shape(Ix4(1, 100, 100, 3)), Ix4(1, 100, 100, 64));
        assert_eq!(layer.num_params(), 64 * 27 + 64);
    }
}
