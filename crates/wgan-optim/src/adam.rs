// Adam — adaptive moment estimation
//
//   m = β1 m + (1 - β1) g
//   v = β2 v + (1 - β2) g²
//   w -= lr * m̂ / (sqrt(v̂) + ε),   m̂ = m / (1 - β1ᵗ), v̂ = v / (1 - β2ᵗ)
//
// `t` counts the updates a parameter actually received, so a parameter that
// sat out some steps is bias-corrected for its own history.
//
// WGAN-GP is usually trained with lr = 1e-4 and betas (0.5, 0.9) or (0.0, 0.9).

use wgan_core::backend::Backend;
use wgan_core::backprop::GradStore;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

use crate::optimizer::{param_and_grad, state_slot, Optimizer};

pub struct Adam<B: Backend> {
    params: Vec<Tensor<B>>,
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    weight_decay: f64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
    t: Vec<u64>,
    steps: u64,
}

impl<B: Backend> Adam<B> {
    /// Adam with betas (0.9, 0.999) and eps 1e-8.
    pub fn new(params: Vec<Tensor<B>>, lr: f64) -> Self {
        let n = params.len();
        Adam {
            params,
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            m: vec![Vec::new(); n],
            v: vec![Vec::new(); n],
            t: vec![0; n],
            steps: 0,
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// L2 penalty folded into the gradient.
    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn betas(&self) -> (f64, f64) {
        (self.beta1, self.beta2)
    }
}

impl<B: Backend> Optimizer<B> for Adam<B> {
    fn step(&mut self, grads: &GradStore<B>) -> Result<Vec<Tensor<B>>> {
        for (i, param) in self.params.iter().enumerate() {
            let Some((mut w, g)) = param_and_grad(param, grads)? else {
                continue;
            };
            self.t[i] += 1;
            let t = self.t[i] as i32;
            let bc1 = 1.0 - self.beta1.powi(t);
            let bc2 = 1.0 - self.beta2.powi(t);

            let len = w.len();
            let m = state_slot(&mut self.m[i], len);
            let v = state_slot(&mut self.v[i], len);
            for j in 0..len {
                let gj = g[j] + self.weight_decay * w[j];
                m[j] = self.beta1 * m[j] + (1.0 - self.beta1) * gj;
                v[j] = self.beta2 * v[j] + (1.0 - self.beta2) * gj * gj;
                let m_hat = m[j] / bc1;
                let v_hat = v[j] / bc2;
                w[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
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
        "adam"
    }
}
