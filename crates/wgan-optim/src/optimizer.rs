// Optimizer trait — turns a GradStore into parameter updates
//
// An optimizer is built from one parameter list and only ever touches those
// tensors. step() looks each parameter up in the GradStore by id, computes
// the new values on the host and writes them back with
// `update_data_inplace`, so every module holding a clone of the parameter
// handle sees the new values on its next forward.
//
// A parameter with no entry in the store (it did not influence the loss) is
// left unchanged and its state is not advanced.

use wgan_core::backend::Backend;
use wgan_core::backprop::GradStore;
use wgan_core::error::Result;
use wgan_core::tensor::Tensor;

/// Gradient-based parameter update rule.
pub trait Optimizer<B: Backend> {
    /// Apply one update from `grads`. Returns the (updated) parameter list.
    fn step(&mut self, grads: &GradStore<B>) -> Result<Vec<Tensor<B>>>;

    /// Parameters this optimizer owns, in construction order.
    fn params(&self) -> &[Tensor<B>];

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);

    /// Number of step() calls so far.
    fn step_count(&self) -> u64;

    /// Short name for logs ("sgd", "adam", ...).
    fn name(&self) -> &'static str;
}

/// Host copies of a parameter and its gradient, or `None` when the store
/// holds no gradient for it.
pub(crate) fn param_and_grad<B: Backend>(
    param: &Tensor<B>,
    grads: &GradStore<B>,
) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
    let Some(grad) = grads.get(param) else {
        return Ok(None);
    };
    let g = grad.to_f64_vec()?;
    if g.len() != param.elem_count() {
        return Err(wgan_core::Error::ShapeMismatch {
            expected: param.shape().clone(),
            got: grad.shape().clone(),
        });
    }
    Ok(Some((param.to_f64_vec()?, g)))
}

/// Lazily sized per-parameter state buffer.
pub(crate) fn state_slot(slot: &mut Vec<f64>, len: usize) -> &mut Vec<f64> {
    if slot.len() != len {
        *slot = vec![0.0; len];
    }
    slot
}
