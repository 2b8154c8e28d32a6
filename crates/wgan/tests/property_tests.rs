// Property tests for the losses and the latent prior

use proptest::prelude::*;

use wgan::cache::CacheRegistry;
use wgan::nn::Module;
use wgan::prelude::*;

fn tensor(data: &[f64], rows: usize) -> CpuTensor {
    CpuTensor::from_f64_slice(data, (rows, data.len() / rows), DType::F64, &CpuDevice).unwrap()
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

proptest! {
    #[test]
    fn wasserstein_loss_is_difference_of_means(
        real in prop::collection::vec(-100.0f64..100.0, 1..32),
        fake in prop::collection::vec(-100.0f64..100.0, 1..32),
    ) {
        let r = tensor(&real, real.len());
        let f = tensor(&fake, fake.len());
        let got = wasserstein_loss(&r, &f).unwrap().to_scalar_f64().unwrap();
        let expected = mean(&real) - mean(&fake);
        prop_assert!((got - expected).abs() < 1e-9, "{got} vs {expected}");
    }

    #[test]
    fn generator_loss_is_mean(fake in prop::collection::vec(-50.0f64..50.0, 1..32)) {
        let f = tensor(&fake, fake.len());
        let got = generator_loss(&f).unwrap().to_scalar_f64().unwrap();
        prop_assert!((got - mean(&fake)).abs() < 1e-9);
    }

    #[test]
    fn penalty_of_linear_critic(
        w in prop::collection::vec(-3.0f64..3.0, 3),
        batch in 1usize..6,
    ) {
        // Input gradient is w for every sample: penalty = (‖w‖ - 1)² ≥ 0.
        let weight = CpuTensor::from_f64_slice(&w, (1, 3), DType::F64, &CpuDevice).unwrap();
        let critic = Linear::from_tensors(weight, None).unwrap();
        let x = CpuTensor::randn((batch, 3), DType::F64, &CpuDevice).unwrap();
        let x_hat = CpuTensor::randn((batch, 3), DType::F64, &CpuDevice).unwrap();
        let p = gradient_penalty(&critic, &x, &x_hat).unwrap().to_scalar_f64().unwrap();
        let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
        prop_assert!(p >= 0.0);
        prop_assert!((p - (norm - 1.0).powi(2)).abs() < 1e-9);
        prop_assert_eq!(critic.parameters().len(), 1);
    }

    #[test]
    fn log_prob_matches_closed_form(
        z in prop::collection::vec(-4.0f64..4.0, 1..8),
    ) {
        let dim = z.len();
        let caches = CacheRegistry::new();
        let prior = LatentPrior::<CpuBackend>::new(dim, DType::F64, CpuDevice, &caches);
        let lp = prior.log_prob(&tensor(&z, 1)).unwrap().to_f64_vec().unwrap();
        let sq: f64 = z.iter().map(|v| v * v).sum();
        let expected = -0.5 * (dim as f64 * (2.0 * std::f64::consts::PI).ln() + sq);
        prop_assert_eq!(lp.len(), 1);
        prop_assert!((lp[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn latent_samples_have_requested_shape(n in 0usize..64, dim in 1usize..8) {
        let caches = CacheRegistry::new();
        let prior = LatentPrior::<CpuBackend>::new(dim, DType::F32, CpuDevice, &caches);
        let z = prior.sample(n).unwrap();
        prop_assert_eq!(z.dims(), &[n, dim]);
    }
}
