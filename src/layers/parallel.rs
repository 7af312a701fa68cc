use ndarray::prelude::*;
use ndarray::RemoveAxis;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::Result;
use crate::topology::LayerSpec;
use crate::{Layer, Mode};

/// Runs the wrapped layer on chunks of the mini-batch in parallel.
///
/// Parameter gradients of the chunks are summed, so the result is the same
/// as running the whole batch at once.
#[derive(Debug)]
pub struct ParallelLayer<L> {
    inner: L,
    /// Examples per rayon task.
    chunk_size: usize,
}

impl<L> ParallelLayer<L> {
    pub fn new(inner: L, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        ParallelLayer { inner, chunk_size }
    }
}

impl<D, L> Layer<D> for ParallelLayer<L>
where
    D: Dimension + RemoveAxis,
    L: Layer<D> + Sync,
{
    type Output = L::Output;

    fn output_shape(&self, input_shape: D) -> Self::Output {
        self.inner.output_shape(input_shape)
    }

    fn num_params(&self) -> usize {
        self.inner.num_params()
    }

    fn init_params(&self, params: ArrayViewMut1<'_, f32>, rng: &mut StdRng) {
        self.inner.init_params(params, rng)
    }

    fn hidden_activations_shape(&self, input_shape: D) -> Ix2 {
        self.inner.hidden_activations_shape(input_shape)
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        self.inner.describe(specs)
    }

    fn apply(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        mut tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut<'_, f32, Self::Output>,
        mode: Mode,
    ) {
        let size = self.chunk_size;
        x.axis_chunks_iter(Axis(0), size)
            .into_par_iter()
            .zip(tmp.axis_chunks_iter_mut(Axis(0), size).into_par_iter())
            .zip(y.axis_chunks_iter_mut(Axis(0), size).into_par_iter())
            .for_each(|((x, tmp), y)| self.inner.apply(params, x, tmp, y, mode));
    }

    fn derivatives(
        &self,
        params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayView2<'_, f32>,
        dz: ArrayView<'_, f32, Self::Output>,
        mut dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D> {
        let size = self.chunk_size;
        let num_params = dp.len();
        let mut dx = Array::zeros(x.raw_dim());

        let total = x
            .axis_chunks_iter(Axis(0), size)
            .into_par_iter()
            .zip(tmp.axis_chunks_iter(Axis(0), size).into_par_iter())
            .zip(dz.axis_chunks_iter(Axis(0), size).into_par_iter())
            .zip(dx.axis_chunks_iter_mut(Axis(0), size).into_par_iter())
            .map(|(((x, tmp), dz), mut dx)| {
                let mut dp = Array1::zeros(num_params);
                dx.assign(&self.inner.derivatives(params, x, tmp, dz, dp.view_mut()));
                dp
            })
            .reduce(|| Array1::zeros(num_params), |a, b| a + b);

        dp.assign(&total);
        dx
    }
}
