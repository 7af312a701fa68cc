use std::fmt::Write as _;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::loss::CategoricalCrossEntropyLoss;
use crate::optim::{Objective, Optimizer};
use crate::topology::{self, LayerSpec};
use crate::traits::{Layer, Loss, Mode};

/// A network together with its parameters and the way it is trained.
///
/// The network `N` takes a batch of images, shape `(n, height, width,
/// channels)`, and produces one probability distribution per image, shape
/// `(n, num_classes)`.
pub struct Model<N, L = CategoricalCrossEntropyLoss> {
    net: N,
    loss: L,
    objective: Objective,
    topology: Vec<LayerSpec>,
    fingerprint: u64,
    input_shape: (usize, usize, usize),
    params: Array1<f32>,
}

/// Settings for [`Model::fit`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Visit the training examples in a new random order each epoch.
    pub shuffle: bool,
    /// Seed for the shuffle order. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Show a progress bar for the batches of each epoch.
    pub progress: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            epochs: 250,
            batch_size: 64,
            shuffle: true,
            seed: None,
            progress: true,
        }
    }
}

/// Metrics for one epoch of training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// Counting from 1.
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

pub type History = Vec<EpochStats>;

impl<N, L> Model<N, L>
where
    N: Layer<Ix4, Output = Ix2>,
    L: Loss<Ix2>,
{
    /// Wrap a network, initializing its parameters randomly.
    ///
    /// Fails if the network doesn't start with an input layer.
    pub fn new(net: N, loss: L, objective: Objective) -> Result<Self> {
        Self::build(net, loss, objective, StdRng::from_entropy())
    }

    /// Like `new`, but the initial parameters depend only on `seed`.
    pub fn with_seed(net: N, loss: L, objective: Objective, seed: u64) -> Result<Self> {
        Self::build(net, loss, objective, StdRng::seed_from_u64(seed))
    }

    fn build(net: N, loss: L, objective: Objective, mut rng: StdRng) -> Result<Self> {
        let mut topology = vec![];
        net.describe(&mut topology)?;
        let input_shape = match topology.first() {
            Some(&LayerSpec::Input {
                height,
                width,
                channels,
            }) => (height, width, channels),
            _ => {
                return Err(Error::InvalidTopology(
                    "network must start with an input layer".to_string(),
                ))
            }
        };
        if topology[1..]
            .iter()
            .any(|spec| matches!(spec, LayerSpec::Input { .. }))
        {
            return Err(Error::InvalidTopology(
                "network has more than one input layer".to_string(),
            ));
        }

        let mut params = Array1::zeros(net.num_params());
        net.init_params(params.view_mut(), &mut rng);
        let fingerprint = topology::fingerprint(&topology);

        Ok(Model {
            net,
            loss,
            objective,
            topology,
            fingerprint,
            input_shape,
            params,
        })
    }

    /// The stages of the network, in order.
    pub fn topology(&self) -> &[LayerSpec] {
        &self.topology
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Shape of one input image, `(height, width, channels)`.
    pub fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    pub fn num_classes(&self) -> usize {
        let (h, w, c) = self.input_shape;
        self.net.output_shape(Ix4(1, h, w, c))[1]
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> ArrayView1<'_, f32> {
        self.params.view()
    }

    /// Replace all parameters at once.
    pub fn set_params(&mut self, params: Array1<f32>) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(Error::ParamCount {
                expected: self.params.len(),
                found: params.len(),
            });
        }
        self.params = params;
        Ok(())
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
    }

    /// Human-readable description of the network, one stage per line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for spec in &self.topology {
            let _ = writeln!(out, "{spec}");
        }
        let _ = writeln!(
            out,
            "regression(optimizer={}, loss={}, learning_rate={}, metric=accuracy)",
            self.objective.optimizer,
            self.loss.name(),
            self.objective.learning_rate
        );
        let _ = write!(
            out,
            "{} parameters, fingerprint {:016x}",
            self.num_params(),
            self.fingerprint
        );
        out
    }

    fn check_input(&self, x: ArrayView4<'_, f32>) -> Result<()> {
        let (_, h, w, c) = x.raw_dim().into_pattern();
        if (h, w, c) != self.input_shape {
            let (eh, ew, ec) = self.input_shape;
            return Err(Error::ShapeMismatch {
                what: "input images",
                got: vec![h, w, c],
                expected: vec![eh, ew, ec],
            });
        }
        Ok(())
    }

    fn forward(&self, x: ArrayView4<'_, f32>, mode: Mode) -> (Array2<f32>, Array2<f32>) {
        let input_shape = x.raw_dim();
        let output_shape = self.net.output_shape(input_shape);
        let mut tmp = Array2::<f32>::zeros(self.net.hidden_activations_shape(input_shape));
        let mut out = Array2::<f32>::zeros(output_shape);
        self.net
            .apply(self.params.view(), x, tmp.view_mut(), out.view_mut(), mode);
        (out, tmp)
    }

    /// Run the model on a batch of images. Row `i` of the result is the
    /// predicted distribution for image `i`.
    pub fn predict(&self, x: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        self.check_input(x)?;
        Ok(self.forward(x, Mode::Infer).0)
    }

    /// Train the model on one batch of examples. Returns the loss and
    /// accuracy on the batch, measured before the update.
    pub fn train_batch(
        &mut self,
        x: ArrayView4<'_, f32>,
        y: ArrayView1<'_, usize>,
        optimizer: &mut dyn Optimizer,
    ) -> (f32, f32) {
        let (yh, tmp) = self.forward(x, Mode::Train);
        let loss = self.loss.loss(y, yh.view());
        let accuracy = self.loss.accuracy(y, yh.view());

        let dyh = self.loss.deriv(y, yh.view());
        let mut dp = Array1::<f32>::zeros(self.params.len());
        let _ = self.net.derivatives(
            self.params.view(),
            x,
            tmp.view(),
            dyh.view(),
            dp.view_mut(),
        );
        optimizer.step(self.params.view_mut(), dp.view());
        (loss, accuracy)
    }

    /// Mean loss and accuracy over a whole dataset, without dropout.
    pub fn evaluate(&self, data: &Dataset, batch_size: usize) -> Result<(f32, f32)> {
        self.check_dataset(data)?;
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        let y = data.class_indices();
        let mut loss_total = 0.0;
        let mut accuracy_total = 0.0;
        for (x, y) in data
            .images()
            .axis_chunks_iter(Axis(0), batch_size)
            .zip(y.axis_chunks_iter(Axis(0), batch_size))
        {
            let n = y.len() as f32;
            let yh = self.forward(x, Mode::Infer).0;
            loss_total += self.loss.loss(y, yh.view()) * n;
            accuracy_total += self.loss.accuracy(y, yh.view()) * n;
        }
        let n = data.len() as f32;
        Ok((loss_total / n, accuracy_total / n))
    }

    fn check_dataset(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        self.check_input(data.images())?;
        if data.num_classes() != self.num_classes() {
            return Err(Error::ShapeMismatch {
                what: "labels",
                got: vec![data.num_classes()],
                expected: vec![self.num_classes()],
            });
        }
        Ok(())
    }

    /// Train for `options.epochs` epochs.
    ///
    /// After each epoch, if there is a validation set, the model is evaluated
    /// on it. One line per epoch is printed to stdout.
    pub fn fit(
        &mut self,
        train: &Dataset,
        validation: Option<&Dataset>,
        options: &FitOptions,
    ) -> Result<History> {
        if options.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        self.check_dataset(train)?;
        if let Some(validation) = validation {
            self.check_dataset(validation)?;
        }

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut optimizer = self.objective.optimizer(self.num_params());
        let labels = train.class_indices();
        let n = train.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut history = History::with_capacity(options.epochs);

        info!(
            "training on {n} examples for {} epochs, batch size {}",
            options.epochs, options.batch_size
        );
        let t0 = Instant::now();
        for epoch in 1..=options.epochs {
            if options.shuffle {
                order.shuffle(&mut rng);
            }
            let pb = progress_bar(n, epoch, options.epochs, options.progress);

            let mut n_total = 0;
            let mut loss_total = 0.0;
            let mut accuracy_total = 0.0;
            for batch in order.chunks(options.batch_size) {
                let x = train.images().select(Axis(0), batch);
                let y = labels.select(Axis(0), batch);
                let (loss, accuracy) = self.train_batch(x.view(), y.view(), optimizer.as_mut());

                n_total += batch.len();
                loss_total += loss * batch.len() as f32;
                accuracy_total += accuracy * batch.len() as f32;
                debug!("epoch {epoch} batch loss={loss:.4} accuracy={accuracy:.4}");
                pb.set_message(format!(
                    "loss={:.4} accuracy={:.4}",
                    loss_total / n_total as f32,
                    accuracy_total / n_total as f32
                ));
                pb.inc(batch.len() as u64);
            }
            pb.finish_and_clear();

            let mut stats = EpochStats {
                epoch,
                loss: loss_total / n_total as f32,
                accuracy: accuracy_total / n_total as f32,
                val_loss: None,
                val_accuracy: None,
            };
            let mut line = format!(
                "epoch {epoch} - loss={:.4} accuracy={:.4}",
                stats.loss, stats.accuracy
            );
            if let Some(validation) = validation {
                let (val_loss, val_accuracy) = self.evaluate(validation, options.batch_size)?;
                stats.val_loss = Some(val_loss);
                stats.val_accuracy = Some(val_accuracy);
                let _ = write!(line, " val_loss={val_loss:.4} val_accuracy={val_accuracy:.4}");
            }
            println!("{line}");
            history.push(stats);
        }
        info!("trained {} epochs in {:?}", options.epochs, t0.elapsed());

        Ok(history)
    }
}

fn progress_bar(len: usize, epoch: usize, epochs: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("epoch {prefix} [{bar:40}] {pos}/{len} {msg}")
            .expect("progress template is valid")
            .progress_chars("#>-"),
    );
    pb.set_prefix(format!("{epoch}/{epochs}"));
    pb
}
