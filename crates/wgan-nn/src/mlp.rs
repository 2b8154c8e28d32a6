// mlp — multilayer perceptron builder
//
//   mlp(&[latent, 64, 64, 2], Activation::Relu, None, dtype, &dev)
//     → Linear(latent→64) ReLU Linear(64→64) ReLU Linear(64→2)
//
// Hidden activations go between Linear layers; `output` (if any) is applied
// after the last one. Generators and critics of the GAN are built this way.

use wgan_core::backend::Backend;
use wgan_core::dtype::DType;
use wgan_core::error::{Error, Result};

use crate::activation::Activation;
use crate::linear::Linear;
use crate::sequential::Sequential;

/// Stack of Linear layers with `sizes[i] → sizes[i+1]`.
pub fn mlp<B: Backend>(
    sizes: &[usize],
    hidden: Activation,
    output: Option<Activation>,
    dtype: DType,
    device: &B::Device,
) -> Result<Sequential<B>> {
    if sizes.len() < 2 {
        return Err(Error::msg(format!(
            "mlp needs at least an input and an output size, got {:?}",
            sizes
        )));
    }
    let mut seq = Sequential::new();
    let last = sizes.len() - 2;
    for (i, pair) in sizes.windows(2).enumerate() {
        seq = seq.add(Linear::<B>::new(pair[0], pair[1], true, dtype, device)?);
        if i < last {
            seq = seq.add_boxed(hidden.module());
        }
    }
    if let Some(act) = output {
        seq = seq.add_boxed(act.module());
    }
    Ok(seq)
}
