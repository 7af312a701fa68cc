//! Tests that check for consistency between `apply` and `derivatives`.

use ndarray::prelude::*;
use ndarray::IntoDimension;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use convclass::layers::{Conv2dLayer, DropoutLayer, InputLayer, LinearLayer, MaxPool2dLayer};
use convclass::{Layer, Mode, Padding};

fn test_layer<L, D>(layer: L, input_shape: D, mode: Mode, error_limit: f32)
where
    D: IntoDimension,
    L: Layer<D::Dim>,
{
    let input_shape = input_shape.into_dimension();
    let output_shape = layer.output_shape(input_shape.clone());

    let n = layer.num_params();
    let mut params = Array::random(n, Uniform::new(0.0, 1.0));
    let mut x = Array::random(input_shape.clone(), Uniform::new(0.0, 1.0));
    let mut tmp = Array2::zeros(layer.hidden_activations_shape(input_shape.clone()));
    let mut z = Array::zeros(output_shape.clone());
    layer.apply(params.view(), x.view(), tmp.view_mut(), z.view_mut(), mode);

    let dz = Array::random(z.raw_dim(), Uniform::new(-0.1, 0.1));
    let mut dp = Array::zeros(n);
    let dx = layer.derivatives(
        params.view(),
        x.view(),
        tmp.view(),
        dz.view(),
        dp.view_mut(),
    );

    let h = 0.0003;

    fn err(claimed: f32, measured: f32) -> f32 {
        let d = measured.abs().max(0.01);
        (claimed - measured).abs() / d
    }

    let mut z_minus = Array::zeros(output_shape.clone());
    let mut z_plus = Array::zeros(output_shape);
    for i in 0..n {
        let saved = params[i];
        params[i] = saved - h;
        layer.apply(params.view(), x.view(), tmp.view_mut(), z_minus.view_mut(), mode);
        params[i] = saved + h;
        layer.apply(params.view(), x.view(), tmp.view_mut(), z_plus.view_mut(), mode);
        params[i] = saved;

        let claimed = dp[i];
        let measured = ((&z_plus - &z_minus) * (1.0 / (2.0 * h)) * &dz).sum();

        let error = err(claimed, measured);
        assert!(
            error <= error_limit,
            "{layer:?}: parameter {i} computed derivative = {claimed}, measured = {measured}, error = {error}, limit = {error_limit}"
        );
    }

    for i in ndarray::indices(input_shape) {
        let i = i.into_dimension();
        let saved = x[i.clone()];
        x[i.clone()] = saved - h;
        layer.apply(params.view(), x.view(), tmp.view_mut(), z_minus.view_mut(), mode);
        x[i.clone()] = saved + h;
        layer.apply(params.view(), x.view(), tmp.view_mut(), z_plus.view_mut(), mode);
        x[i.clone()] = saved;

        let claimed = dx[i.clone()];
        let measured = ((&z_plus - &z_minus) * (1.0 / (2.0 * h)) * &dz).sum();

        let error = err(claimed, measured);
        assert!(
            error <= error_limit,
            "{layer:?}: input element {i:?} computed derivative = {claimed}, measured = {measured}, error = {error}, limit = {error_limit}"
        );
    }
}

#[test]
fn test_dense_consistency() {
    test_layer(LinearLayer::new(1, 1), (1, 1), Mode::Train, 0.01);
    test_layer(LinearLayer::new(5, 3), (2, 5), Mode::Train, 0.01);
    test_layer(LinearLayer::new(5, 3).relu(), (2, 5), Mode::Train, 0.01);
    test_layer(LinearLayer::new(5, 3).tanh(), (2, 5), Mode::Train, 0.01);
    test_layer(LinearLayer::new(5, 3).sigmoid(), (2, 5), Mode::Train, 0.01);
    test_layer(LinearLayer::new(4, 2).softmax(), (3, 4), Mode::Train, 0.01);
    test_layer(
        LinearLayer::new(3, 3).tanh().linear(3, 4).softmax(),
        (2, 3),
        Mode::Train,
        0.01,
    );

    test_layer(LinearLayer::new(2, 2).parallel(1), (3, 2), Mode::Train, 0.01);
    test_layer(LinearLayer::new(2, 2).parallel(4), (5, 2), Mode::Train, 0.01);
}

#[test]
fn test_dropout_consistency() {
    // With everything kept, training-mode dropout is the identity, so the
    // mask doesn't change between the perturbed passes.
    test_layer(
        LinearLayer::new(4, 3).dropout(1.0).linear(3, 2),
        (2, 4),
        Mode::Train,
        0.01,
    );
    test_layer(
        LinearLayer::new(4, 3).tanh().dropout(0.5).linear(3, 2),
        (2, 4),
        Mode::Infer,
        0.01,
    );
}

#[test]
fn test_conv_consistency() {
    test_layer(
        Conv2dLayer::new(Ix4(2, 3, 3, 1), 1, Padding::Same),
        (1, 4, 6, 1),
        Mode::Train,
        0.04,
    );
    test_layer(
        Conv2dLayer::new(Ix4(2, 3, 3, 3), 1, Padding::Valid),
        (2, 4, 6, 3),
        Mode::Train,
        0.04,
    );
    test_layer(
        Conv2dLayer::new(Ix4(2, 3, 3, 2), 2, Padding::Same),
        (1, 5, 5, 2),
        Mode::Train,
        0.04,
    );
    test_layer(
        InputLayer::new(4, 4, 1)
            .conv2d(1, 2, 3, 1, Padding::Same)
            .tanh()
            .flatten()
            .linear(32, 2)
            .softmax(),
        (2, 4, 4, 1),
        Mode::Train,
        0.04,
    );
    // can't test MaxPool2dLayer this way, because `h` is big enough to move
    // the maximum; see test_pool
}

fn pool(layer: &MaxPool2dLayer, x: &Array4<f32>, dy: &Array4<f32>) -> (Array4<f32>, Array4<f32>) {
    let mut y: Array4<f32> = Array::zeros(layer.output_shape(x.raw_dim()));
    let n = x.len_of(Axis(0));
    layer.apply(
        ArrayView::from_shape(0, &[]).unwrap(),
        x.view(),
        ArrayViewMut::from_shape((n, 0), &mut []).unwrap(),
        y.view_mut(),
        Mode::Train,
    );
    let dx = layer.derivatives(
        ArrayView::from_shape(0, &[]).unwrap(),
        x.view(),
        ArrayView2::from_shape((n, 0), &[]).unwrap(),
        dy.view(),
        ArrayViewMut1::from_shape(0, &mut []).unwrap(),
    );
    (y, dx)
}

#[test]
fn test_pool() {
    let layer = MaxPool2dLayer::new(2, 2);
    let x: Array3<f32> = array![
        [[0.528783300, 0.48312938], [0.21382916, 0.98248150]],
        [[0.081051946, 0.60761390], [0.17663562, 0.98261246]]
    ];
    let x: Array4<f32> = x.into_shape((1, 2, 2, 2)).unwrap();
    let dy: Array4<f32> = 0.7f32 * Array::ones((1, 1, 1, 2));

    let (y, dx) = pool(&layer, &x, &dy);
    assert_eq!(y.raw_dim().into_pattern(), (1, 1, 1, 2));
    assert_eq!(y.slice(s![0, 0, 0, ..]), array![0.5287833, 0.98261246]);
    assert_eq!(
        dx.slice(s![0, .., .., ..]),
        array![[[0.7, 0.0], [0.0, 0.0]], [[0.0, 0.0], [0.0, 0.7]],]
    );
}

#[test]
fn test_pool_same_padding() {
    // 3×3 input, 2×2 windows, stride 2: the last row and column of windows
    // hang off the edge and only see what's there.
    let layer = MaxPool2dLayer::new(2, 2);
    let x = Array::from_shape_vec((1, 3, 3, 1), (1..=9).map(|v| v as f32).collect()).unwrap();
    let dy = Array::ones((1, 2, 2, 1));

    let (y, dx) = pool(&layer, &x, &dy);
    assert_eq!(
        y.index_axis(Axis(3), 0).index_axis(Axis(0), 0),
        array![[5.0, 6.0], [8.0, 9.0]]
    );
    assert_eq!(
        dx.index_axis(Axis(3), 0).index_axis(Axis(0), 0),
        array![[0.0, 0.0, 0.0], [0.0, 1.0, 1.0], [0.0, 1.0, 1.0]]
    );
}

#[test]
fn test_dropout_masks_gradient() {
    let layer = DropoutLayer::new(0.25);
    let x = Array2::<f32>::ones((2, 64));
    let mut tmp = Array2::zeros(Layer::<Ix2>::hidden_activations_shape(&layer, x.raw_dim()));
    let mut y = Array2::zeros(x.raw_dim());
    layer.apply(
        ArrayView1::from_shape(0, &[]).unwrap(),
        x.view(),
        tmp.view_mut(),
        y.view_mut(),
        Mode::Train,
    );
    let dz = Array2::from_elem((2, 64), 0.5f32);
    let dx = layer.derivatives(
        ArrayView1::from_shape(0, &[]).unwrap(),
        x.view(),
        tmp.view(),
        dz.view(),
        ArrayViewMut1::from_shape(0, &mut []).unwrap(),
    );
    for (&dx, &y) in dx.iter().zip(&y) {
        assert_eq!(dx, 0.5 * y);
    }
}
