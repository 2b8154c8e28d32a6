// Activation modules — element-wise nonlinearities as Modules
//
// Thin wrappers around the tensor-level functions so activations can sit in
// a Sequential between Linear layers:
//
//   Sequential::new()
//       .add(Linear::new(2, 64, true, DType::F32, &dev)?)
//       .add(LeakyReLU::with_slope(0.2))
//       .add(Linear::new(64, 1, true, DType::F32, &dev)?)
//
// All of them are built from differentiable ops, so a gradient taken through
// them can be differentiated again.

use wgan_core::backend::Backend;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

use crate::module::Module;

/// ReLU activation: max(0, x)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl<B: Backend> Module<B> for ReLU {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.relu()
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// LeakyReLU activation: x if x >= 0, negative_slope * x otherwise.
///
/// Default negative_slope = 0.01. Critics usually want 0.2.
#[derive(Debug, Clone, Copy)]
pub struct LeakyReLU {
    negative_slope: f64,
}

impl LeakyReLU {
    pub fn new() -> Self {
        LeakyReLU {
            negative_slope: 0.01,
        }
    }

    pub fn with_slope(negative_slope: f64) -> Self {
        LeakyReLU { negative_slope }
    }

    pub fn negative_slope(&self) -> f64 {
        self.negative_slope
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Module<B> for LeakyReLU {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        let zeros = Tensor::<B>::zeros_like(x)?;
        let mask = x.ge(&zeros)?;
        let scaled = x.affine(self.negative_slope, 0.0)?;
        Tensor::<B>::where_cond(&mask, x, &scaled)
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// Sigmoid activation: 1 / (1 + e^(-x))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl<B: Backend> Module<B> for Sigmoid {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.sigmoid()
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// Tanh activation
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl<B: Backend> Module<B> for Tanh {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.tanh()
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// Activation choice for builders such as [`crate::mlp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    LeakyRelu(f64),
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Boxed module for this activation.
    pub fn module<B: Backend>(self) -> Box<dyn Module<B>> {
        match self {
            Activation::Relu => Box::new(ReLU),
            Activation::LeakyRelu(slope) => Box::new(LeakyReLU::with_slope(slope)),
            Activation::Sigmoid => Box::new(Sigmoid),
            Activation::Tanh => Box::new(Tanh),
        }
    }
}
