// LatentPrior — N(0, I) over the generator's input space
//
//   sample(n)    (n, D) standard-normal draws
//   log_prob(z)  -0.5 * (D ln 2π + Σ_j z_j²), one value per row
//
// The constant part of the log-density is memoized in a cache owned by the
// model's registry, so `reset_caches()` drops it along with the rest.

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::shape::Shape;
use wgan_core::tensor::Tensor;
use wgan_core::DType;

use crate::cache::{CacheRegistry, MemoCache};

/// Diagonal standard-normal prior of dimension `dim`.
pub struct LatentPrior<B: Backend> {
    dim: usize,
    dtype: DType,
    device: B::Device,
    normalizer: MemoCache<usize, f64>,
}

impl<B: Backend> LatentPrior<B> {
    pub fn new(dim: usize, dtype: DType, device: B::Device, caches: &CacheRegistry) -> Self {
        LatentPrior {
            dim,
            dtype,
            device,
            normalizer: caches.cache(1),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// `n` independent draws, shape `(n, dim)`.
    pub fn sample(&self, n: usize) -> Result<Tensor<B>> {
        Tensor::<B>::randn((n, self.dim), self.dtype, &self.device)
    }

    /// `-0.5 * D * ln(2π)`: the log-density at the origin.
    pub fn log_normalizer(&self) -> Result<f64> {
        let dim = self.dim;
        self.normalizer.get_or_try_insert_with(dim, || {
            Ok(-0.5 * dim as f64 * (2.0 * std::f64::consts::PI).ln())
        })
    }

    /// Log-density of each row of `z`, shape `(n,)`.
    pub fn log_prob(&self, z: &Tensor<B>) -> Result<Tensor<B>> {
        if z.rank() != 2 || z.dims()[1] != self.dim {
            let n = z.dims().first().copied().unwrap_or(0);
            return Err(Error::ShapeMismatch {
                expected: Shape::from((n, self.dim)),
                got: z.shape().clone(),
            });
        }
        let c = self.log_normalizer()?;
        z.square()?.sum(1, false)?.affine(-0.5, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgan_cpu::{CpuBackend, CpuDevice};

    fn prior(dim: usize) -> (LatentPrior<CpuBackend>, CacheRegistry) {
        let caches = CacheRegistry::new();
        (
            LatentPrior::new(dim, DType::F64, CpuDevice, &caches),
            caches,
        )
    }

    #[test]
    fn test_log_prob_at_origin() {
        let (p, _) = prior(3);
        let z = Tensor::<CpuBackend>::zeros((2, 3), DType::F64, &CpuDevice).unwrap();
        let lp = p.log_prob(&z).unwrap();
        assert_eq!(lp.dims(), &[2]);
        let expected = -0.5 * 3.0 * (2.0 * std::f64::consts::PI).ln();
        for v in lp.to_f64_vec().unwrap() {
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_log_prob_rejects_wrong_width() {
        let (p, _) = prior(3);
        let z = Tensor::<CpuBackend>::zeros((2, 4), DType::F64, &CpuDevice).unwrap();
        assert!(matches!(
            p.log_prob(&z),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_normalizer_is_cached_and_clearable() {
        let (p, caches) = prior(4);
        let a = p.log_normalizer().unwrap();
        let b = p.log_normalizer().unwrap();
        assert_eq!(a, b);
        assert_eq!(p.normalizer.stats(), (1, 1));
        caches.clear_all();
        assert!(p.normalizer.is_empty());
        assert_eq!(p.log_normalizer().unwrap(), a);
    }
}
