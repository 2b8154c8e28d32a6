// Tests for wgan-data: Dataset, VecDataset, DataLoader

use wgan_core::DType;
use wgan_cpu::{CpuBackend, CpuDevice};
use wgan_data::dataset::{Dataset, Sample, VecDataset};
use wgan_data::loader::{DataLoader, DataLoaderConfig};

// 1×2×2 "images" whose pixels all equal the sample index

struct TinyImages {
    n: usize,
    shape: Vec<usize>,
}

impl TinyImages {
    fn new(n: usize) -> Self {
        Self {
            n,
            shape: vec![1, 2, 2],
        }
    }
}

impl Dataset for TinyImages {
    fn len(&self) -> usize {
        self.n
    }

    fn get(&self, index: usize) -> Sample {
        Sample::new(vec![index as f64; 4], self.shape.clone())
    }

    fn feature_shape(&self) -> &[usize] {
        &self.shape
    }

    fn name(&self) -> &str {
        "tiny-images"
    }
}

// Emits one sample of the wrong size

struct Broken;

impl Dataset for Broken {
    fn len(&self) -> usize {
        2
    }

    fn get(&self, index: usize) -> Sample {
        Sample::new(vec![0.0; index + 1], vec![2])
    }

    fn feature_shape(&self) -> &[usize] {
        &[2]
    }
}

#[test]
fn test_multi_dim_batches_in_order() {
    let ds = TinyImages::new(6);
    let config = DataLoaderConfig::default()
        .batch_size(3)
        .shuffle(false)
        .dtype(DType::F64);
    let mut loader = DataLoader::<CpuBackend>::new(&ds, CpuDevice, config).unwrap();
    let batches = loader.epoch_batches().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].dims(), &[3, 1, 2, 2]);
    assert_eq!(batches[0].dtype(), DType::F64);
    let v = batches[1].to_f64_vec().unwrap();
    assert_eq!(&v[..4], &[3.0; 4]);
    assert_eq!(&v[8..], &[5.0; 4]);
}

#[test]
fn test_parallel_fetch_matches_sequential() {
    let ds = TinyImages::new(16);
    let base = DataLoaderConfig::default()
        .batch_size(8)
        .shuffle(false)
        .dtype(DType::F64);
    let mut seq = DataLoader::<CpuBackend>::new(&ds, CpuDevice, base.clone()).unwrap();
    let mut par = DataLoader::<CpuBackend>::new(&ds, CpuDevice, base.num_workers(4)).unwrap();
    let a: Vec<Vec<f64>> = seq
        .epoch_batches()
        .unwrap()
        .iter()
        .map(|b| b.to_f64_vec().unwrap())
        .collect();
    let b: Vec<Vec<f64>> = par
        .epoch_batches()
        .unwrap()
        .iter()
        .map(|b| b.to_f64_vec().unwrap())
        .collect();
    assert_eq!(a, b);
}

#[test]
fn test_shuffle_is_a_permutation() {
    let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
    let ds = VecDataset::from_rows(&rows).unwrap();
    let config = DataLoaderConfig::default()
        .batch_size(5)
        .seed(9)
        .dtype(DType::F64);
    let mut loader = DataLoader::<CpuBackend>::new(&ds, CpuDevice, config).unwrap();
    let mut seen: Vec<f64> = loader
        .iter_batches()
        .flat_map(|b| b.unwrap().to_f64_vec().unwrap())
        .collect();
    assert_ne!(seen, (0..20).map(|i| i as f64).collect::<Vec<_>>());
    seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(seen, (0..20).map(|i| i as f64).collect::<Vec<_>>());
}

#[test]
fn test_bad_sample_reported() {
    let ds = Broken;
    let config = DataLoaderConfig::default().batch_size(2).shuffle(false);
    let mut loader = DataLoader::<CpuBackend>::new(&ds, CpuDevice, config).unwrap();
    let err = loader.epoch_batches().unwrap_err();
    assert!(err.to_string().contains("dataset"), "{err}");
}

#[test]
fn test_vec_dataset_validation() {
    assert!(VecDataset::new(vec![1.0, 2.0, 3.0], vec![2]).is_err());
    assert!(VecDataset::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    let ds = VecDataset::new(vec![1.0, 2.0, 3.0, 4.0], vec![2]).unwrap();
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.get(1).features, vec![3.0, 4.0]);
    assert_eq!(ds.name(), "vec");
}
