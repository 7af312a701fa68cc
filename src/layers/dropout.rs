use ndarray::prelude::*;
use ndarray::{RemoveAxis, Zip};
use rand::Rng;

use crate::array_util::{rows_as, rows_as_mut};
use crate::error::Result;
use crate::topology::LayerSpec;
use crate::{Layer, Mode};

/// Inverted dropout.
///
/// While training, each input element is kept with probability `keep_prob`
/// and scaled by `1 / keep_prob`, or zeroed otherwise. At inference time the
/// layer passes its input through unchanged.
///
/// The mask is stored in the hidden-activation buffer so the backward pass
/// drops the same elements.
#[derive(Debug)]
pub struct DropoutLayer {
    keep_prob: f32,
}

impl DropoutLayer {
    pub fn new(keep_prob: f32) -> Self {
        assert!(
            keep_prob > 0.0 && keep_prob <= 1.0,
            "keep probability must be in (0, 1], got {keep_prob}"
        );
        DropoutLayer { keep_prob }
    }
}

impl<D> Layer<D> for DropoutLayer
where
    D: Dimension + RemoveAxis,
{
    type Output = D;

    fn output_shape(&self, input_shape: D) -> D {
        input_shape
    }

    fn hidden_activations_shape(&self, input_shape: D) -> Ix2 {
        let n = input_shape[0];
        Ix2(n, input_shape.remove_axis(Axis(0)).size())
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        specs.push(LayerSpec::Dropout {
            keep_prob: self.keep_prob,
        });
        Ok(())
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayViewMut2<'_, f32>,
        mut y: ArrayViewMut<'_, f32, D>,
        mode: Mode,
    ) {
        let mut mask = rows_as_mut(tmp, x.raw_dim());
        match mode {
            Mode::Train => {
                let mut rng = rand::thread_rng();
                let scale = 1.0 / self.keep_prob;
                mask.map_inplace(|m| {
                    *m = if rng.gen::<f32>() < self.keep_prob {
                        scale
                    } else {
                        0.0
                    }
                });
            }
            Mode::Infer => mask.fill(1.0),
        }
        Zip::from(&mut y)
            .and(&x)
            .and(&mask)
            .for_each(|y, &x, &m| *y = x * m);
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        x: ArrayView<'_, f32, D>,
        tmp: ArrayView2<'_, f32>,
        dz: ArrayView<'_, f32, D>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array<f32, D> {
        let mask = rows_as(tmp, x.raw_dim());
        &dz * &mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(layer: &DropoutLayer, x: &Array2<f32>, mode: Mode) -> (Array2<f32>, Array2<f32>) {
        let mut tmp = Array2::zeros(Layer::<Ix2>::hidden_activations_shape(layer, x.raw_dim()));
        let mut y = Array2::zeros(x.raw_dim());
        layer.apply(ArrayView1::from(&[]), x.view(), tmp.view_mut(), y.view_mut(), mode);
        (y, tmp)
    }

    #[test]
    fn inference_is_identity() {
        let layer = DropoutLayer::new(0.5);
        let x = Array2::from_shape_fn((3, 8), |(i, j)| (i * 8 + j) as f32);
        let (y, _) = run(&layer, &x, Mode::Infer);
        assert_eq!(y, x);
    }

    #[test]
    fn training_drops_and_rescales() {
        let layer = DropoutLayer::new(0.5);
        let x = Array2::<f32>::ones((4, 256));
        let (y, tmp) = run(&layer, &x, Mode::Train);
        assert!(y.iter().all(|&v| v == 0.0 || v == 2.0));
        let kept = y.iter().filter(|&&v| v == 2.0).count();
        // 1024 coin flips; this is many standard deviations from either end
        assert!(kept > 300 && kept < 724, "kept {kept} of 1024");

        // backward pass uses the same mask
        let dz = Array2::<f32>::ones((4, 256));
        let dx = layer.derivatives(
            ArrayView1::from(&[]),
            x.view(),
            tmp.view(),
            dz.view(),
            ArrayViewMut1::from(&mut []),
        );
        assert_eq!(dx, y);
    }
}
