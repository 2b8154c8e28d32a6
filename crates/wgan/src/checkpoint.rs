// Checkpoint — save and load named parameters
//
// Binary checkpoint format (.wgan):
//
//   Header:
//     magic:   [u8; 4]  = b"WGAN"
//     version: u32 LE   = 1
//     count:   u32 LE   = number of tensors
//
//   For each tensor:
//     key_len:  u32 LE
//     key:      [u8; key_len]  (UTF-8, e.g. "critic.layers.0.weight")
//     dtype:    u8             (0=F32, 1=F64)
//     ndim:     u32 LE
//     dims:     [u32 LE; ndim]
//     data_len: u64 LE         (in bytes)
//     data:     [u8; data_len] (raw little-endian typed data)
//
// Usage:
//   model.save_weights("runs/ring/weights.wgan")?;
//   checkpoint::save_tensors("weights.wgan", &named_tensors)?;
//   let tensors = checkpoint::load_tensors::<CpuBackend>("weights.wgan", &device)?;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::tensor::Tensor;
use wgan_core::DType;

const MAGIC: &[u8; 4] = b"WGAN";
const VERSION: u32 = 1;

// Tensor data <-> bytes (through f64 on the host)

fn tensor_to_bytes<B: Backend>(tensor: &Tensor<B>) -> Result<Vec<u8>> {
    let data = tensor.to_f64_vec()?;
    Ok(match tensor.dtype() {
        DType::F32 => data
            .iter()
            .flat_map(|&v| (v as f32).to_le_bytes())
            .collect(),
        DType::F64 => data.iter().flat_map(|&v| v.to_le_bytes()).collect(),
    })
}

fn tensor_from_bytes<B: Backend>(
    bytes: &[u8],
    shape: Vec<usize>,
    dtype: DType,
    device: &B::Device,
) -> Result<Tensor<B>> {
    let data: Vec<f64> = match dtype {
        DType::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        DType::F64 => bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    };
    Tensor::<B>::from_f64_slice(&data, shape, dtype, device)
}

// Low-level IO helpers

fn write_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u8(r: &mut impl Read) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

// Never preallocates `len`: the buffer only grows with bytes actually read.
fn read_bytes(r: &mut impl Read, len: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, found {}", buf.len()),
        ));
    }
    Ok(buf)
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::msg(format!("{what} {v} does not fit the checkpoint format")))
}

// Write / read

/// Write named tensors in the checkpoint format.
pub fn write_checkpoint<B: Backend>(
    writer: &mut impl Write,
    tensors: &[(String, Tensor<B>)],
) -> Result<()> {
    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, to_u32(tensors.len(), "tensor count")?)?;

    for (key, tensor) in tensors {
        let key_bytes = key.as_bytes();
        write_u32(writer, to_u32(key_bytes.len(), "key length")?)?;
        writer.write_all(key_bytes)?;

        writer.write_all(&[tensor.dtype().tag()])?;

        let dims = tensor.dims();
        write_u32(writer, to_u32(dims.len(), "rank")?)?;
        for &d in dims {
            write_u32(writer, to_u32(d, "dimension")?)?;
        }

        let data = tensor_to_bytes(tensor)?;
        write_u64(writer, data.len() as u64)?;
        writer.write_all(&data)?;
    }
    Ok(())
}

/// Read named tensors written by [`write_checkpoint`].
pub fn read_checkpoint<B: Backend>(
    reader: &mut impl Read,
    device: &B::Device,
) -> Result<Vec<(String, Tensor<B>)>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::msg(format!(
            "invalid checkpoint: expected magic {:?}, got {:?}",
            MAGIC, magic
        )));
    }

    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(Error::msg(format!(
            "unsupported checkpoint version: {} (expected {})",
            version, VERSION
        )));
    }

    let count = read_u32(reader)?;
    let mut tensors = Vec::new();
    for _ in 0..count {
        let key_len = read_u32(reader)? as u64;
        let key = String::from_utf8(read_bytes(reader, key_len)?)
            .map_err(|e| Error::msg(format!("invalid UTF-8 key: {e}")))?;

        let dtype = DType::from_tag(read_u8(reader)?)?;

        let ndim = read_u32(reader)?;
        let mut dims = Vec::new();
        for _ in 0..ndim {
            dims.push(read_u32(reader)? as usize);
        }

        let expected = dims
            .iter()
            .try_fold(dtype.size_in_bytes() as u64, |acc, &d| acc.checked_mul(d as u64))
            .ok_or_else(|| {
                Error::msg(format!("tensor '{key}': shape {dims:?} of {dtype} is too large"))
            })?;
        let data_len = read_u64(reader)?;
        if data_len != expected {
            return Err(Error::msg(format!(
                "tensor '{key}': {data_len} data bytes, shape {dims:?} of {dtype} needs {expected}"
            )));
        }
        let data = read_bytes(reader, data_len)?;

        tensors.push((key, tensor_from_bytes::<B>(&data, dims, dtype, device)?));
    }
    Ok(tensors)
}

// Files

/// Save named tensors to `path`. Missing parent directories are created.
pub fn save_tensors<B: Backend>(
    path: impl AsRef<Path>,
    tensors: &[(String, Tensor<B>)],
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_checkpoint(&mut writer, tensors)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), tensors = tensors.len(), "saved checkpoint");
    Ok(())
}

/// Load named tensors from `path`, in file order.
pub fn load_tensors<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<Vec<(String, Tensor<B>)>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let tensors = read_checkpoint(&mut reader, device)?;
    tracing::info!(path = %path.display(), tensors = tensors.len(), "loaded checkpoint");
    Ok(tensors)
}

// In memory

pub fn to_bytes<B: Backend>(tensors: &[(String, Tensor<B>)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_checkpoint(&mut buf, tensors)?;
    Ok(buf)
}

pub fn from_bytes<B: Backend>(data: &[u8], device: &B::Device) -> Result<Vec<(String, Tensor<B>)>> {
    let mut cursor = std::io::Cursor::new(data);
    read_checkpoint(&mut cursor, device)
}
