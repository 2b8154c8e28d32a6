// Module trait — the interface every layer implements
//
// forward() maps an input tensor to an output tensor; parameters() lists the
// trainable tensors an optimizer should update. Modules are generic over the
// backend, so one network definition runs on any device.
//
// The GAN owns two modules (generator, critic). Each optimizer is built from
// exactly one module's parameters(), which is what keeps the two parameter
// sets apart during training.

use wgan_core::backend::Backend;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

/// The fundamental trait for all neural network layers.
///
/// # Example
/// ```ignore
/// struct Critic<B: Backend> {
///     body: Sequential<B>,
/// }
///
/// impl<B: Backend> Module<B> for Critic<B> {
///     fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
///         self.body.forward(x)
///     }
///     fn parameters(&self) -> Vec<Tensor<B>> {
///         self.body.parameters()
///     }
/// }
/// ```
pub trait Module<B: Backend> {
    /// Compute the output tensor from the input tensor.
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>>;

    /// All trainable parameters of this module.
    fn parameters(&self) -> Vec<Tensor<B>>;

    /// Switch between training and evaluation behaviour.
    ///
    /// Uses interior mutability so `&self` suffices. Default is a no-op.
    fn set_training(&self, _training: bool) {}

    /// Whether the module is in training mode (default: true).
    fn is_training(&self) -> bool {
        true
    }

    fn train(&self) {
        self.set_training(true);
    }

    fn eval(&self) {
        self.set_training(false);
    }

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.elem_count()).sum()
    }

    /// Parameters with stable names. Composite modules join child names with
    /// `"."`, e.g. `"layers.0.weight"`.
    ///
    /// The default uses positional indices (`param_0`, `param_1`, ...).
    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        self.parameters()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (format!("param_{i}"), p))
            .collect()
    }
}

impl<B: Backend, M: Module<B> + ?Sized> Module<B> for Box<M> {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        (**self).forward(x)
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        (**self).parameters()
    }
    fn set_training(&self, training: bool) {
        (**self).set_training(training)
    }
    fn is_training(&self) -> bool {
        (**self).is_training()
    }
    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        (**self).named_parameters()
    }
}
