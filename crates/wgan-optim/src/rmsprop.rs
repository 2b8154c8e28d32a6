// RMSProp — running average of squared gradients
//
//   s = α s + (1 - α) g²
//   w -= lr * g / (sqrt(s) + ε)
//
// The optimizer of the original weight-clipping WGAN; kept for comparison
// runs against Adam.

use wgan_core::backend::Backend;
use wgan_core::backprop::GradStore;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

use crate::optimizer::{param_and_grad, state_slot, Optimizer};

pub struct RMSProp<B: Backend> {
    params: Vec<Tensor<B>>,
    lr: f64,
    alpha: f64,
    eps: f64,
    square_avg: Vec<Vec<f64>>,
    steps: u64,
}

impl<B: Backend> RMSProp<B> {
    /// RMSProp with α = 0.99 and ε = 1e-8.
    pub fn new(params: Vec<Tensor<B>>, lr: f64) -> Self {
        let n = params.len();
        RMSProp {
            params,
            lr,
            alpha: 0.99,
            eps: 1e-8,
            square_avg: vec![Vec::new(); n],
            steps: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }
}

impl<B: Backend> Optimizer<B> for RMSProp<B> {
    fn step(&mut self, grads: &GradStore<B>) -> Result<Vec<Tensor<B>>> {
        for (i, param) in self.params.iter().enumerate() {
            let Some((mut w, g)) = param_and_grad(param, grads)? else {
                continue;
            };
            let s = state_slot(&mut self.square_avg[i], w.len());
            for j in 0..w.len() {
                s[j] = self.alpha * s[j] + (1.0 - self.alpha) * g[j] * g[j];
                w[j] -= self.lr * g[j] / (s[j].sqrt() + self.eps);
            }
            param.update_data_inplace(&w)?;
        }
        self.steps += 1;
        Ok(self.params.clone())
    }

    fn params(&self) -> &[Tensor<B>] {
        &self.params
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn step_count(&self) -> u64 {
        self.steps
    }

    fn name(&self) -> &'static str {
        "rmsprop"
    }
}
