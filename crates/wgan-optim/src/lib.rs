//! # wgan-optim
//!
//! Optimizers for gradient-based training.
//!
//! The training loop is:
//!
//! 1. `output = model.forward(input)`
//! 2. `loss = loss_fn(output)`
//! 3. `grads = loss.backward()`: autograd computes gradients
//! 4. `optimizer.step(&grads)`: the optimizer updates *its own* parameters
//!
//! Implemented optimizers:
//! - **SGD**: stochastic gradient descent (optional momentum, weight decay)
//! - **Adam**: adaptive moment estimation
//! - **RMSProp**: root mean square propagation

pub mod adam;
pub mod optimizer;
pub mod rmsprop;
pub mod sgd;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use rmsprop::RMSProp;
pub use sgd::SGD;
