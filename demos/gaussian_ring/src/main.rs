// Gaussian Ring — WGAN-GP on a 2-D mixture of Gaussians
//
// Real data: 8 Gaussians (σ = 0.05) placed evenly on the unit circle.
// The generator maps 2-D noise to points; the critic scores points. After
// training, the generated points should cluster around the 8 modes.
//
// Usage:
//   cargo run -p gaussian_ring                   # default config
//   cargo run -p gaussian_ring -- config.json    # WganConfig as JSON
//   RUST_LOG=debug cargo run -p gaussian_ring    # per-step losses
//
// This example demonstrates:
//   1. Building generator and critic with `mlp`
//   2. Feeding real samples through a DataLoader
//   3. The n-critic schedule with Trainer
//   4. Watching a fixed preview batch and saving weights

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing_subscriber::EnvFilter;

use wgan::prelude::*;

const MODES: usize = 8;
const RADIUS: f64 = 1.0;
const STD: f64 = 0.05;

fn ring_dataset(n: usize, seed: u64) -> wgan::Result<VecDataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n * 2);
    for _ in 0..n {
        let k = rng.gen_range(0..MODES);
        let angle = 2.0 * std::f64::consts::PI * k as f64 / MODES as f64;
        let dx: f64 = rng.sample(StandardNormal);
        let dy: f64 = rng.sample(StandardNormal);
        data.push(RADIUS * angle.cos() + STD * dx);
        data.push(RADIUS * angle.sin() + STD * dy);
    }
    VecDataset::new(data, vec![2])
}

/// Fraction of points within 3σ of some mode.
fn mode_coverage(points: &[f64]) -> (f64, usize) {
    let mut hit = [false; MODES];
    let mut close = 0;
    for p in points.chunks_exact(2) {
        for (k, h) in hit.iter_mut().enumerate() {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / MODES as f64;
            let d = ((p[0] - angle.cos()).powi(2) + (p[1] - angle.sin()).powi(2)).sqrt();
            if d < 3.0 * STD {
                *h = true;
                close += 1;
                break;
            }
        }
    }
    let n = points.len() / 2;
    (close as f64 / n.max(1) as f64, hit.iter().filter(|h| **h).count())
}

fn main() -> wgan::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => WganConfig::from_json_file(&path)?,
        None => WganConfig {
            batch_size: 128,
            latent_dim: 2,
            dtype: DType::F32,
            ..WganConfig::default()
        },
    };
    println!("=== WGAN-GP — Gaussian Ring ===");
    println!("{}", config.to_json_string()?);
    println!();

    wgan::manual_seed(0);
    let dev = CpuDevice;

    // 1. Networks
    let generator = mlp::<CpuBackend>(
        &[config.latent_dim, 64, 64, 2],
        Activation::Relu,
        None,
        config.dtype,
        &dev,
    )?;
    let critic = mlp::<CpuBackend>(
        &[2, 64, 64, 1],
        Activation::LeakyRelu(0.2),
        None,
        config.dtype,
        &dev,
    )?;
    let mut gan = WassersteinGan::with_adam(generator, critic, 1e-3, config.clone(), dev)?;
    println!("Parameters: {}", gan.num_parameters());

    // 2. Data
    let dataset = ring_dataset(config.batch_size * 32, 42)?;
    let mut loader = DataLoader::<CpuBackend>::new(
        &dataset,
        dev,
        DataLoaderConfig::default()
            .batch_size(config.batch_size)
            .dtype(config.dtype)
            .seed(7),
    )?;

    // 3. Train
    let before = mode_coverage(&gan.preview(512)?.to_f64_vec()?);
    let history = Trainer::new(10).fit(&mut gan, &mut loader)?;
    println!("{history}");

    // 4. Inspect
    let after = mode_coverage(&gan.preview(512)?.to_f64_vec()?);
    println!(
        "Preview batch near a mode: {:.1}% → {:.1}% ({} → {} of {MODES} modes)",
        before.0 * 100.0,
        after.0 * 100.0,
        before.1,
        after.1
    );

    let path = std::env::temp_dir().join("wgan_demo").join("gaussian_ring.wgan");
    gan.save_weights(&path)?;
    println!("Weights saved to {}", path.display());
    Ok(())
}
