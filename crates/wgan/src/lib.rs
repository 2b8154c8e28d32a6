//! # wgan
//!
//! Wasserstein GAN with gradient penalty, built on a small tensor runtime.
//!
//! This is the top-level crate: it re-exports the runtime and adds the GAN
//! training step on top of it.
//!
//! ## Usage
//!
//! ```rust
//! use wgan::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `wgan-core` | Tensor, Shape, DType, Layout, Backend trait, higher-order autograd |
//! | `wgan-cpu` | CPU backend with rayon matmul and a seedable RNG |
//! | `wgan-nn` | Module trait, Linear, activations, Sequential, `mlp` builder |
//! | `wgan-optim` | Optimizers (SGD, Adam, RMSProp) |
//! | `wgan-data` | Dataset, DataLoader |
//!
//! ## Modules
//!
//! - [`gan`]: latent prior, losses, gradient penalty and the training steps
//! - [`trainer`]: critic/generator schedule over a DataLoader
//! - [`config`]: tri-state options and `WganConfig`
//! - [`cache`]: clearable memoization shared by a model
//! - [`checkpoint`]: save/load named parameters

/// Re-export core types.
pub use wgan_core::{
    backend::{Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp},
    op::{Op, TensorId},
    DType, Error, GradStore, Layout, Result, Shape, Tensor,
};

/// Re-export CPU backend.
pub use wgan_cpu::{manual_seed, CpuBackend, CpuDevice, CpuStorage, CpuTensor};

/// Re-export neural network modules.
pub mod nn {
    pub use wgan_nn::*;
}

/// Re-export optimizers.
pub mod optim {
    pub use wgan_optim::*;
}

/// Re-export datasets and the loader.
pub mod data {
    pub use wgan_data::*;
}

/// Clearable memoization caches.
pub mod cache;

/// Checkpoint: save and load model parameters.
pub mod checkpoint;

/// Tri-state options and model configuration.
pub mod config;

/// The Wasserstein GAN itself.
pub mod gan;

/// Epoch loop with the n-critic schedule.
pub mod trainer;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::cache::{CacheRegistry, MemoCache};
    pub use crate::config::{CallOptions, OptionValue, Options, Setting, WganConfig};
    pub use crate::data::{DataLoader, DataLoaderConfig, Dataset, VecDataset};
    pub use crate::gan::{
        generator_loss, gradient_penalty, wasserstein_loss, LatentPrior, LossMap,
        WassersteinGan,
    };
    pub use crate::nn::{mlp, Activation, LeakyReLU, Linear, Module, ReLU, Sequential, Tanh};
    pub use crate::optim::{Adam, Optimizer, RMSProp, SGD};
    pub use crate::trainer::{EpochLog, StepLog, TrainHistory, Trainer};
    pub use crate::{CpuBackend, CpuDevice, CpuTensor, DType, GradStore, Shape, Tensor};
}
