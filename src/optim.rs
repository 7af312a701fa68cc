//! Optimizers: rules for turning a gradient into a parameter update.

use std::fmt;

use clap::ValueEnum;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Updates parameters in place from the gradient of the loss.
pub trait Optimizer: fmt::Debug {
    fn step(&mut self, params: ArrayViewMut1<'_, f32>, grad: ArrayView1<'_, f32>);
}

/// Plain gradient descent: a step of length `learning_rate` straight down
/// the gradient.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, mut params: ArrayViewMut1<'_, f32>, grad: ArrayView1<'_, f32>) {
        params.scaled_add(-self.learning_rate, &grad);
    }
}

/// Gradient descent with momentum.
///
/// Keeps a running sum of gradients, decayed by `momentum` each step, and
/// moves the parameters along it:
///
/// ```text
/// velocity = momentum * velocity + grad
/// params  -= learning_rate * velocity
/// ```
#[derive(Debug)]
pub struct Momentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Array1<f32>,
}

impl Momentum {
    pub fn new(learning_rate: f32, momentum: f32, num_params: usize) -> Self {
        Momentum {
            learning_rate,
            momentum,
            velocity: Array1::zeros(num_params),
        }
    }
}

impl Optimizer for Momentum {
    fn step(&mut self, mut params: ArrayViewMut1<'_, f32>, grad: ArrayView1<'_, f32>) {
        assert_eq!(grad.len(), self.velocity.len());
        self.velocity *= self.momentum;
        self.velocity += &grad;
        params.scaled_add(-self.learning_rate, &self.velocity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OptimizerKind {
    Momentum,
    Sgd,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizerKind::Momentum => "momentum",
            OptimizerKind::Sgd => "sgd",
        })
    }
}

/// How a model is trained: which optimizer, with which settings.
///
/// This is not part of the network topology; a model trained with one
/// objective can be loaded into a network built with another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    /// Decay factor for the momentum optimizer. Ignored by SGD.
    pub momentum: f32,
}

impl Default for Objective {
    fn default() -> Self {
        Objective {
            optimizer: OptimizerKind::Momentum,
            learning_rate: 0.001,
            momentum: 0.9,
        }
    }
}

impl Objective {
    /// A fresh optimizer for a model with `num_params` parameters.
    pub fn optimizer(&self, num_params: usize) -> Box<dyn Optimizer> {
        match self.optimizer {
            OptimizerKind::Momentum => Box::new(Momentum::new(
                self.learning_rate,
                self.momentum,
                num_params,
            )),
            OptimizerKind::Sgd => Box::new(Sgd::new(self.learning_rate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgd_steps_downhill() {
        let mut p = array![1.0f32, -1.0];
        let mut opt = Sgd::new(0.5);
        opt.step(p.view_mut(), array![2.0, -2.0].view());
        assert_eq!(p, array![0.0, 0.0]);
    }

    #[test]
    fn momentum_accumulates() {
        let mut p = array![0.0f32];
        let mut opt = Momentum::new(0.1, 0.9, 1);
        let g = array![1.0f32];
        opt.step(p.view_mut(), g.view());
        assert!((p[0] + 0.1).abs() < 1e-6);
        // velocity is now 0.9 * 1 + 1 = 1.9
        opt.step(p.view_mut(), g.view());
        assert!((p[0] + 0.29).abs() < 1e-6);
    }
}
