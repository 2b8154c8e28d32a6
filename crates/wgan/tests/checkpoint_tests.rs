// Tests for checkpoint save/load

use wgan::checkpoint;
use wgan::prelude::*;

fn small_gan(
) -> wgan::Result<WassersteinGan<CpuBackend, Sequential<CpuBackend>, Sequential<CpuBackend>>> {
    let dev = CpuDevice;
    let generator = mlp::<CpuBackend>(&[3, 8, 2], Activation::Relu, None, DType::F32, &dev)?;
    let critic = mlp::<CpuBackend>(&[2, 8, 1], Activation::Relu, None, DType::F32, &dev)?;
    let cfg = WganConfig {
        batch_size: 4,
        latent_dim: 3,
        ..WganConfig::default()
    };
    WassersteinGan::with_adam(generator, critic, 1e-3, cfg, dev)
}

fn values(gan: &WassersteinGan<CpuBackend, Sequential<CpuBackend>, Sequential<CpuBackend>>)
    -> wgan::Result<Vec<(String, Vec<f64>)>> {
    gan.named_parameters()
        .into_iter()
        .map(|(k, v)| Ok((k, v.to_f64_vec()?)))
        .collect()
}

#[test]
fn test_bytes_roundtrip_keeps_dtype_and_shape() -> wgan::Result<()> {
    let dev = CpuDevice;
    let a = CpuTensor::from_f64_slice(&[1.5, -2.0, 3.25, 0.0, 7.0, 8.0], (2, 3), DType::F32, &dev)?;
    let b = CpuTensor::from_f64_slice(&[0.1, 0.2], 2, DType::F64, &dev)?;
    let tensors = vec![("a".to_string(), a), ("b".to_string(), b)];

    let bytes = checkpoint::to_bytes(&tensors)?;
    assert_eq!(&bytes[..4], b"WGAN");
    let loaded = checkpoint::from_bytes::<CpuBackend>(&bytes, &dev)?;

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].0, "a");
    assert_eq!(loaded[0].1.dims(), &[2, 3]);
    assert_eq!(loaded[0].1.dtype(), DType::F32);
    assert_eq!(loaded[0].1.to_f64_vec()?, vec![1.5, -2.0, 3.25, 0.0, 7.0, 8.0]);
    assert_eq!(loaded[1].1.dtype(), DType::F64);
    assert_eq!(loaded[1].1.to_f64_vec()?, vec![0.1, 0.2]);
    Ok(())
}

#[test]
fn test_bad_magic_rejected() {
    let r = checkpoint::from_bytes::<CpuBackend>(b"SHRW\x01\x00\x00\x00\x00\x00\x00\x00", &CpuDevice);
    assert!(r.is_err());
}

#[test]
fn test_truncated_data_rejected() -> wgan::Result<()> {
    let t = CpuTensor::ones((4, 4), DType::F64, &CpuDevice)?;
    let bytes = checkpoint::to_bytes(&[("t".to_string(), t)])?;
    let r = checkpoint::from_bytes::<CpuBackend>(&bytes[..bytes.len() - 8], &CpuDevice);
    assert!(matches!(r, Err(wgan::Error::Io(_))));
    Ok(())
}

#[test]
fn test_save_creates_parent_directories() -> wgan::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("runs").join("ring").join("weights.wgan");
    let t = CpuTensor::zeros((2, 2), DType::F32, &CpuDevice)?;
    checkpoint::save_tensors(&path, &[("z".to_string(), t)])?;
    assert!(path.exists());
    let loaded = checkpoint::load_tensors::<CpuBackend>(&path, &CpuDevice)?;
    assert_eq!(loaded[0].0, "z");
    Ok(())
}

#[test]
fn test_model_weights_roundtrip() -> wgan::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gan.wgan");

    let source = small_gan()?;
    let target = small_gan()?;
    assert_ne!(values(&source)?, values(&target)?);

    source.save_weights(&path)?;
    let n = target.load_weights(&path)?;
    assert_eq!(n, source.named_parameters().len());
    assert_eq!(values(&source)?, values(&target)?);

    // Loaded values are live: the generator computes with them.
    let z = source.sample_latent_data(2)?;
    assert_eq!(
        source.transform(&z)?.to_f64_vec()?,
        target.transform(&z)?.to_f64_vec()?
    );
    Ok(())
}

#[test]
fn test_load_weights_missing_tensor() -> wgan::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("partial.wgan");
    let gan = small_gan()?;
    let partial: Vec<_> = gan.named_parameters().into_iter().take(2).collect();
    checkpoint::save_tensors(&path, &partial)?;
    let err = gan.load_weights(&path).unwrap_err();
    assert!(err.to_string().contains("checkpoint has no tensor"), "{err}");
    Ok(())
}

#[test]
fn test_load_missing_file_is_io_error() {
    let r = checkpoint::load_tensors::<CpuBackend>("/nonexistent/dir/w.wgan", &CpuDevice);
    assert!(matches!(r, Err(wgan::Error::Io(_))));
}

fn header(count: u32) -> Vec<u8> {
    let mut bytes = b"WGAN".to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes
}

#[test]
fn test_huge_tensor_count_is_an_error() {
    let r = checkpoint::from_bytes::<CpuBackend>(&header(u32::MAX), &CpuDevice);
    assert!(matches!(r, Err(wgan::Error::Io(_))));
}

#[test]
fn test_overflowing_dims_are_an_error() {
    let mut bytes = header(1);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(b'w');
    bytes.push(DType::F64.tag());
    bytes.extend_from_slice(&3u32.to_le_bytes());
    for _ in 0..3 {
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    }
    bytes.extend_from_slice(&0u64.to_le_bytes());
    let err = checkpoint::from_bytes::<CpuBackend>(&bytes, &CpuDevice).unwrap_err();
    assert!(err.to_string().contains("too large"), "{err}");
}

#[test]
fn test_huge_key_length_is_an_error() {
    let mut bytes = header(1);
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(b"short");
    let r = checkpoint::from_bytes::<CpuBackend>(&bytes, &CpuDevice);
    assert!(matches!(r, Err(wgan::Error::Io(_))));
}
