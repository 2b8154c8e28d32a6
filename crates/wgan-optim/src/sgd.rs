// SGD — stochastic gradient descent with optional momentum
//
//   g'  = g + weight_decay * w
//   v   = momentum * v + g'        (momentum > 0)
//   w  -= lr * v                   (or lr * g' without momentum)

use wgan_core::backend::Backend;
use wgan_core::backprop::GradStore;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

use crate::optimizer::{param_and_grad, state_slot, Optimizer};

pub struct SGD<B: Backend> {
    params: Vec<Tensor<B>>,
    lr: f64,
    momentum: f64,
    weight_decay: f64,
    velocity: Vec<Vec<f64>>,
    steps: u64,
}

impl<B: Backend> SGD<B> {
    pub fn new(params: Vec<Tensor<B>>, lr: f64, momentum: f64, weight_decay: f64) -> Self {
        let velocity = vec![Vec::new(); params.len()];
        SGD {
            params,
            lr,
            momentum,
            weight_decay,
            velocity,
            steps: 0,
        }
    }
}

impl<B: Backend> Optimizer<B> for SGD<B> {
    fn step(&mut self, grads: &GradStore<B>) -> Result<Vec<Tensor<B>>> {
        for (i, param) in self.params.iter().enumerate() {
            let Some((mut w, g)) = param_and_grad(param, grads)? else {
                continue;
            };
            let v = state_slot(&mut self.velocity[i], w.len());
            for j in 0..w.len() {
                let gj = g[j] + self.weight_decay * w[j];
                let update = if self.momentum > 0.0 {
                    v[j] = self.momentum * v[j] + gj;
                    v[j]
                } else {
                    gj
                };
                w[j] -= self.lr * update;
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
        "sgd"
    }
}
