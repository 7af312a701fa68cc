use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

use crate::error::Result;
use crate::topology::LayerSpec;
use crate::{Layer, Mode};

/// Fully connected layer: `z = x · W + b`.
///
/// Input shape is `(N, num_inputs)`, output shape `(N, num_outputs)`. The
/// parameters are the weight matrix `W`, row-major, followed by one bias per
/// output.
#[derive(Debug)]
pub struct LinearLayer {
    ni: usize,
    no: usize,
}

impl LinearLayer {
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        LinearLayer {
            ni: num_inputs,
            no: num_outputs,
        }
    }

    fn split_params<'a>(&self, params: ArrayView1<'a, f32>) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        let (w, b) = params.split_at(Axis(0), self.ni * self.no);
        let w = w
            .into_shape((self.ni, self.no))
            .expect("params are a contiguous slice");
        (w, b)
    }
}

impl Layer<Ix2> for LinearLayer {
    type Output = Ix2;

    fn output_shape(&self, input_shape: Ix2) -> Ix2 {
        assert_eq!(
            input_shape[1], self.ni,
            "fully connected layer expects {} inputs",
            self.ni
        );
        Ix2(input_shape[0], self.no)
    }

    fn num_params(&self) -> usize {
        (self.ni + 1) * self.no
    }

    /// Weights are drawn from `N(0, 1 / num_inputs)`; biases start at zero.
    fn init_params(&self, params: ArrayViewMut1<'_, f32>, rng: &mut StdRng) {
        let (mut w, mut b) = params.split_at(Axis(0), self.ni * self.no);
        let scale = 1.0 / (self.ni as f32).sqrt();
        w.assign(&(scale * Array1::<f32>::random_using(self.ni * self.no, StandardNormal, rng)));
        b.fill(0.0);
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        specs.push(LayerSpec::FullyConnected {
            units: self.no,
            activation: None,
        });
        Ok(())
    }

    fn apply(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView2<'_, f32>,
        _tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut2<'_, f32>,
        _mode: Mode,
    ) {
        let (w, b) = self.split_params(params);
        y.assign(&(x.dot(&w) + &b));
    }

    fn derivatives(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView2<'_, f32>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView2<'_, f32>,
        dp: ArrayViewMut1<'_, f32>,
    ) -> Array2<f32> {
        assert_eq!(dz.dim(), (x.nrows(), self.no));
        let (w, _) = self.split_params(params);

        let (dw, mut db) = dp.split_at(Axis(0), self.ni * self.no);
        let mut dw = dw
            .into_shape((self.ni, self.no))
            .expect("dp is a contiguous slice");
        dw.assign(&x.t().dot(&dz));
        db.assign(&dz.sum_axis(Axis(0)));

        dz.dot(&w.t())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_then_biases() {
        let layer = LinearLayer::new(2, 3);
        assert_eq!(layer.num_params(), 9);
        // W = [[1, 2, 3], [4, 5, 6]], b = [0.5, 0, -0.5]
        let params = array![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 0.5, 0.0, -0.5];
        let x = array![[1.0f32, 1.0], [0.0, 2.0]];
        let mut y = Array2::zeros((2, 3));
        let mut tmp = Array2::zeros((2, 0));
        layer.apply(params.view(), x.view(), tmp.view_mut(), y.view_mut(), Mode::Infer);
        assert_eq!(y, array![[5.5, 7.0, 8.5], [8.5, 10.0, 11.5]]);

        let dz = array![[1.0f32, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let mut dp = Array1::zeros(9);
        let dx = layer.derivatives(params.view(), x.view(), tmp.view(), dz.view(), dp.view_mut());
        assert_eq!(dx, array![[1.0, 4.0], [3.0, 6.0]]);
        assert_eq!(dp, array![1.0, 0.0, 0.0, 1.0, 0.0, 2.0, 1.0, 0.0, 1.0]);
    }
}
