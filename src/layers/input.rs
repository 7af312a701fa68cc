use ndarray::prelude::*;

use crate::error::Result;
use crate::topology::LayerSpec;
use crate::{Layer, Mode};

/// Layer that does nothing but specify the shape of the images coming in.
#[derive(Debug)]
pub struct InputLayer {
    height: usize,
    width: usize,
    channels: usize,
}

impl InputLayer {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        InputLayer {
            height,
            width,
            channels,
        }
    }

    /// Shape of one example, `(height, width, channels)`.
    pub fn example_shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}

impl Layer<Ix4> for InputLayer {
    type Output = Ix4;

    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        let (_, h, w, c) = input_shape.into_pattern();
        assert_eq!(
            (h, w, c),
            self.example_shape(),
            "input images have the wrong shape"
        );
        input_shape
    }

    fn describe(&self, specs: &mut Vec<LayerSpec>) -> Result<()> {
        specs.push(LayerSpec::Input {
            height: self.height,
            width: self.width,
            channels: self.channels,
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
        y.assign(&x);
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, f32>,
        _x: ArrayView4<'_, f32>,
        _tmp: ArrayView2<'_, f32>,
        dz: ArrayView4<'_, f32>,
        _dp: ArrayViewMut1<'_, f32>,
    ) -> Array4<f32> {
        dz.into_owned()
    }
}
