// Sequential — a chain of modules applied one after another
//
//   let model = Sequential::new()
//       .add(linear1)
//       .add(ReLU)
//       .add(linear2);
//
// The output of each layer becomes the input to the next. Training mode is
// tracked here and pushed down to every child.

use std::cell::Cell;

use wgan_core::backend::Backend;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

use crate::module::Module;

/// A container that chains modules sequentially. Nests, since it is a Module
/// itself.
pub struct Sequential<B: Backend> {
    layers: Vec<Box<dyn Module<B>>>,
    training: Cell<bool>,
}

impl<B: Backend> Sequential<B> {
    pub fn new() -> Self {
        Sequential {
            layers: Vec::new(),
            training: Cell::new(true),
        }
    }

    /// Append a layer. Returns self for chaining.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: Module<B> + 'static>(mut self, module: M) -> Self {
        self.layers.push(Box::new(module));
        self
    }

    /// Append an already boxed layer.
    pub fn add_boxed(mut self, module: Box<dyn Module<B>>) -> Self {
        self.layers.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<B: Backend> Default for Sequential<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Module<B> for Sequential<B> {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        let mut out = x.clone();
        for layer in &self.layers {
            out = layer.forward(&out)?;
        }
        Ok(out)
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let mut named = Vec::new();
        for (i, layer) in self.layers.iter().enumerate() {
            for (k, v) in layer.named_parameters() {
                named.push((format!("layers.{i}.{k}"), v));
            }
        }
        named
    }

    fn set_training(&self, training: bool) {
        self.training.set(training);
        for layer in &self.layers {
            layer.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.training.get()
    }
}
