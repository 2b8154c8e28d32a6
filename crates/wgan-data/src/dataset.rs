// Dataset trait — indexed source of real samples
//
// A GAN only needs inputs: there are no labels or targets. A sample is one
// flattened feature vector plus the shape it should have inside a batch.

use wgan_core::error::{Error, Result};

/// A single unlabeled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Row-major feature values.
    pub features: Vec<f64>,
    /// Shape of one sample without the batch dimension (`[2]` for points,
    /// `[1, 28, 28]` for images).
    pub feature_shape: Vec<usize>,
}

impl Sample {
    pub fn new(features: Vec<f64>, feature_shape: Vec<usize>) -> Self {
        Sample {
            features,
            feature_shape,
        }
    }
}

/// An indexed collection of samples.
///
/// Implementations must be `Send + Sync` so the DataLoader can fetch from
/// several threads.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.len()`.
    fn get(&self, index: usize) -> Sample;

    /// Shape of one sample (without batch dim).
    fn feature_shape(&self) -> &[usize];

    fn name(&self) -> &str {
        "dataset"
    }
}

/// In-memory dataset: one flat buffer of equally shaped samples.
#[derive(Debug, Clone)]
pub struct VecDataset {
    data: Vec<f64>,
    feature_shape: Vec<usize>,
    sample_len: usize,
}

impl VecDataset {
    /// `data` holds `n * prod(feature_shape)` values, sample after sample.
    pub fn new(data: Vec<f64>, feature_shape: Vec<usize>) -> Result<Self> {
        let sample_len: usize = feature_shape.iter().product();
        if sample_len == 0 || data.len() % sample_len != 0 {
            return Err(Error::msg(format!(
                "VecDataset: {} values do not split into samples of shape {:?}",
                data.len(),
                feature_shape
            )));
        }
        Ok(VecDataset {
            data,
            feature_shape,
            sample_len,
        })
    }

    /// One row per sample, all rows of the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::msg("VecDataset::from_rows: ragged rows"));
        }
        Self::new(rows.concat(), vec![width])
    }
}

impl Dataset for VecDataset {
    fn len(&self) -> usize {
        self.data.len() / self.sample_len
    }

    fn get(&self, index: usize) -> Sample {
        let start = index * self.sample_len;
        Sample::new(
            self.data[start..start + self.sample_len].to_vec(),
            self.feature_shape.clone(),
        )
    }

    fn feature_shape(&self) -> &[usize] {
        &self.feature_shape
    }

    fn name(&self) -> &str {
        "vec"
    }
}
