// DataLoader — batching, shuffling, iteration over real samples

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

use rayon::prelude::*;

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::tensor::Tensor;
use wgan_core::DType;

use crate::dataset::{Dataset, Sample};

/// Configuration for the DataLoader.
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    pub batch_size: usize,
    /// Shuffle indices at the start of every epoch.
    pub shuffle: bool,
    /// Drop the last incomplete batch. On by default: the generator always
    /// produces `batch_size` fakes, so every real batch must match.
    pub drop_last: bool,
    pub dtype: DType,
    /// Parallel sample fetching through rayon (0 = sequential).
    pub num_workers: usize,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            shuffle: true,
            drop_last: true,
            dtype: DType::F32,
            num_workers: 0,
            seed: None,
        }
    }
}

impl DataLoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn dtype(mut self, d: DType) -> Self {
        self.dtype = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// Wraps a Dataset and produces `[batch, ...feature_shape]` tensors.
pub struct DataLoader<'a, B: Backend> {
    dataset: &'a dyn Dataset,
    config: DataLoaderConfig,
    device: B::Device,
    indices: Vec<usize>,
    rng: Option<StdRng>,
}

impl<'a, B: Backend> DataLoader<'a, B> {
    pub fn new(
        dataset: &'a dyn Dataset,
        device: B::Device,
        config: DataLoaderConfig,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::config("DataLoader batch_size must be positive"));
        }
        let indices: Vec<usize> = (0..dataset.len()).collect();
        let rng = config.seed.map(StdRng::seed_from_u64);
        Ok(Self {
            dataset,
            config,
            device,
            indices,
            rng,
        })
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// Batches per epoch.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.dataset.len() / self.config.batch_size
        } else {
            self.dataset.len().div_ceil(self.config.batch_size)
        }
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Reshuffle indices (called at the start of each epoch).
    pub fn reshuffle(&mut self) {
        if !self.config.shuffle {
            return;
        }
        match self.rng.as_mut() {
            Some(rng) => self.indices.shuffle(rng),
            None => self.indices.shuffle(&mut thread_rng()),
        }
    }

    fn fetch_samples(&self, indices: &[usize]) -> Vec<Sample> {
        if self.config.num_workers > 0 && indices.len() > 1 {
            indices.par_iter().map(|&i| self.dataset.get(i)).collect()
        } else {
            indices.iter().map(|&i| self.dataset.get(i)).collect()
        }
    }

    /// Stack the samples at `batch_idx` of the current order into a tensor.
    fn batch(&self, batch_idx: usize) -> Result<Tensor<B>> {
        let bs = self.config.batch_size;
        let start = batch_idx * bs;
        let end = (start + bs).min(self.dataset.len());
        let batch_indices: Vec<usize> = (start..end).map(|i| self.indices[i]).collect();
        let samples = self.fetch_samples(&batch_indices);

        let feat_shape = self.dataset.feature_shape().to_vec();
        let per_sample: usize = feat_shape.iter().product();
        let mut data: Vec<f64> = Vec::with_capacity(samples.len() * per_sample);
        for s in &samples {
            if s.features.len() != per_sample {
                return Err(Error::msg(format!(
                    "{}: sample has {} values, expected shape {:?}",
                    self.dataset.name(),
                    s.features.len(),
                    feat_shape
                )));
            }
            data.extend_from_slice(&s.features);
        }

        let mut shape = vec![samples.len()];
        shape.extend_from_slice(&feat_shape);
        Tensor::<B>::from_f64_slice(&data, shape, self.config.dtype, &self.device)
    }

    /// All batches of one epoch.
    pub fn epoch_batches(&mut self) -> Result<Vec<Tensor<B>>> {
        self.reshuffle();
        (0..self.num_batches()).map(|i| self.batch(i)).collect()
    }

    /// Iterate over batches one at a time (lower memory than `epoch_batches`).
    pub fn iter_batches(&mut self) -> BatchIterator<'_, 'a, B> {
        self.reshuffle();
        BatchIterator {
            loader: self,
            batch_idx: 0,
        }
    }
}

/// Iterator that yields one batch at a time.
pub struct BatchIterator<'l, 'a, B: Backend> {
    loader: &'l DataLoader<'a, B>,
    batch_idx: usize,
}

impl<'l, 'a, B: Backend> Iterator for BatchIterator<'l, 'a, B> {
    type Item = Result<Tensor<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch_idx >= self.loader.num_batches() {
            return None;
        }
        let batch = self.loader.batch(self.batch_idx);
        self.batch_idx += 1;
        Some(batch)
    }
}
