//! # wgan-nn
//!
//! Layers for building generators and critics, following the [`Module`]
//! trait pattern:
//!
//! 1. **Module trait**: every layer implements `forward()` and `parameters()`
//! 2. **Linear**: fully connected, `y = xWᵀ + b`
//! 3. **Activations**: ReLU, LeakyReLU, Sigmoid, Tanh as modules
//! 4. **Sequential** and the [`mlp`] builder
//!
//! Modules are generic over `Backend` (like `Tensor<B>`).

pub mod activation;
pub mod linear;
pub mod mlp;
pub mod module;
pub mod sequential;

pub use activation::{Activation, LeakyReLU, ReLU, Sigmoid, Tanh};
pub use linear::Linear;
pub use mlp::mlp;
pub use module::Module;
pub use sequential::Sequential;
