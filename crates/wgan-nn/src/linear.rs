// Linear — fully-connected layer: y = x Wᵀ + b
//
// PARAMETER SHAPES:
//
//   weight: [out_features, in_features]
//   bias:   [1, out_features]            broadcast over the batch
//
// INITIALIZATION:
//
// Both are drawn from U(-k, k), k = sqrt(1 / in_features). The draw goes
// through the backend generator, so `manual_seed` makes it reproducible.

use wgan_core::backend::Backend;
use wgan_core::dtype::DType;
use wgan_core::error::{Error, Result};
use wgan_core::tensor::Tensor;

use crate::module::Module;

/// A fully-connected layer.
///
/// # Examples
/// ```ignore
/// let linear = Linear::<CpuBackend>::new(2, 64, true, DType::F32, &dev)?;
/// let x = CpuTensor::randn((32, 2), DType::F32, &dev)?;
/// let y = linear.forward(&x)?; // [32, 64]
/// ```
pub struct Linear<B: Backend> {
    weight: Tensor<B>,
    bias: Option<Tensor<B>>,
    in_features: usize,
    out_features: usize,
}

fn uniform_param<B: Backend>(
    shape: (usize, usize),
    k: f64,
    dtype: DType,
    device: &B::Device,
) -> Result<Tensor<B>> {
    // The affine op is dropped so the parameter is a true leaf.
    Ok(Tensor::<B>::rand(shape, dtype, device)?
        .affine(2.0 * k, -k)?
        .detach()
        .set_variable())
}

impl<B: Backend> Linear<B> {
    pub fn new(
        in_features: usize,
        out_features: usize,
        use_bias: bool,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(Error::msg(format!(
                "Linear needs non-zero features, got {in_features} -> {out_features}"
            )));
        }
        let k = (1.0 / in_features as f64).sqrt();
        let weight = uniform_param::<B>((out_features, in_features), k, dtype, device)?;
        let bias = if use_bias {
            Some(uniform_param::<B>((1, out_features), k, dtype, device)?)
        } else {
            None
        };
        Ok(Linear {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    /// Build from existing tensors (e.g. loaded weights).
    pub fn from_tensors(weight: Tensor<B>, bias: Option<Tensor<B>>) -> Result<Self> {
        if weight.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: weight.rank(),
            });
        }
        let out_features = weight.dims()[0];
        let in_features = weight.dims()[1];
        if let Some(b) = &bias {
            if b.dims() != [1, out_features] {
                return Err(Error::msg(format!(
                    "Linear bias must be [1, {out_features}], got {}",
                    b.shape()
                )));
            }
        }
        Ok(Linear {
            weight: weight.set_variable(),
            bias: bias.map(|b| b.set_variable()),
            in_features,
            out_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn weight(&self) -> &Tensor<B> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor<B>> {
        self.bias.as_ref()
    }
}

impl<B: Backend> Module<B> for Linear<B> {
    /// `[batch, in_features]` → `[batch, out_features]`
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        let wt = self.weight.t()?.contiguous()?;
        let output = x.matmul(&wt)?;
        match &self.bias {
            Some(bias) => output.add(bias),
            None => Ok(output),
        }
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        let mut params = vec![self.weight.clone()];
        if let Some(ref b) = self.bias {
            params.push(b.clone());
        }
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let mut named = vec![("weight".to_string(), self.weight.clone())];
        if let Some(ref b) = self.bias {
            named.push(("bias".to_string(), b.clone()));
        }
        named
    }
}
