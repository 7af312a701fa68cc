use ndarray::prelude::*;
use rand::rngs::StdRng;

use crate::array_util::{rows_as, rows_as_mut};
use crate::error::Result;
use crate::topology::LayerSpec;
use crate::{Layer, Mode};

/// Two layers, one after the other.
///
/// Longer pipelines are nested sequences, built with [`Layer::then`] and the
/// other builder methods.
#[derive(Debug)]
pub struct Sequence<L1, L2> {
    first: L1,
    second: L2,
    first_num_params: usize,
    num_params: usize,
}

impl<L1, L2> Sequence<L1, L2> {
    pub(crate) fn new<D>(first: L1, second: L2) -> Self
    where
        D: Dimension,
        L1: Layer<D>,
        L2: Layer<L1::Output>,
    {
        let first_num_params = first.num_params();
        let num_params = first_num_params + second.num_params();
        Self {
            first,
            second,
            first_num_params,
            num_params,
        }
    }
}

impl<L1, L2, D> Layer<D> for Sequence<L1, L2>
where
    D: Dimension,
    L1: Layer<D>,
    L2: Layer<L1::Output>,
{
    type Output = L2::Output;

    fn output_shape(&self, input_shape: D) -> Self::Output {
        let hidden_shape = self.first.output_shape(input_shape);
        self.second.output_shape(hidden_shape)
    }

    fn num_params(&self) -> usize {
        self.num_params
    }

    fn init_params(&self, params: ArrayViewMut1<'_, f32>, rng: &mut StdRng) {
        let (p1, p2) = params.split_at(Axis(0), self.first_num_params);
        self.first.init_params(p1, rng);
        self.second.init_params(p2, rng);
    }

    /// The buffer holds, per example: the first layer's hidden activations,
    /// then the first layer's output, then the second layer's hidden
    /// activations.
    fn hidden_activations_shape(&self, input_shape: D) -> Ix2 {
        let n = input_shape[0];
        let hidden_shape = self.first.output_shape(input_shape.clone());
        let first = self.first.hidden_activations_shape(input_shape)[1];
        let mid = if n == 0 { 0 } else { hidden_shape.size() / n };
        let second = self.second.hidden_activations_shape(hidden_shape)[1];
        Ix2(n, first + mid + second)
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        self.first.describe(specs)?;
        self.second.describe(specs)
    }

    fn apply(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayViewMut2<'_, f32>,
        y: ArrayViewMut<'_, f32, Self::Output>,
        mode: Mode,
    ) {
        let input_shape = x.raw_dim();
        let hidden_shape = self.first.output_shape(input_shape.clone());
        let m1 = self.first.hidden_activations_shape(input_shape)[1];
        let (tmp1, tmp) = tmp.split_at(Axis(1), m1);
        let mid_len = tmp.len_of(Axis(1)) - self.second.hidden_activations_shape(hidden_shape.clone())[1];
        let (mid, tmp2) = tmp.split_at(Axis(1), mid_len);
        let mut m = rows_as_mut(mid, hidden_shape);

        let (p1, p2) = params.split_at(Axis(0), self.first_num_params);
        self.first.apply(p1, x.view(), tmp1, m.view_mut(), mode);
        self.second.apply(p2, m.view(), tmp2, y, mode);
    }

    fn derivatives(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayView2<'_, f32>,
        dz: ArrayView<'_, f32, Self::Output>,
        dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D> {
        let (p1, p2) = params.split_at(Axis(0), self.first_num_params);
        let (dp1, dp2) = dp.split_at(Axis(0), self.first_num_params);

        // Find the activations of the first layer. They are stored in the
        // middle of `tmp`. This is equivalent to recomputing them by calling
        // self.first.apply(), but that would be slow.
        let input_shape = x.raw_dim();
        let hidden_shape = self.first.output_shape(input_shape.clone());
        let m1 = self.first.hidden_activations_shape(input_shape)[1];
        let m2 = tmp.len_of(Axis(1)) - self.second.hidden_activations_shape(hidden_shape.clone())[1];
        let m = rows_as(tmp.slice(s![.., m1..m2]), hidden_shape);

        let dm = self
            .second
            .derivatives(p2, m.view(), tmp.slice(s![.., m2..]), dz, dp2);
        self.first
            .derivatives(p1, x, tmp.slice(s![.., ..m1]), dm.view(), dp1)
    }
}
