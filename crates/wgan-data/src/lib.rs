//! # wgan-data
//!
//! Feeding real samples to the critic.
//!
//! - [`Dataset`]: indexed collection of unlabeled samples
//! - [`VecDataset`]: in-memory dataset over a flat buffer
//! - [`DataLoader`]: batching, seeded shuffling and optional parallel fetch

pub mod dataset;
pub mod loader;

pub use dataset::{Dataset, Sample, VecDataset};
pub use loader::{BatchIterator, DataLoader, DataLoaderConfig};
