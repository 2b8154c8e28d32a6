// CPU Backend — host-memory implementation of the wgan Backend trait
//
// ARCHITECTURE:
// - CpuDevice is a unit struct; there is only one host.
// - CpuStorage is an enum over Vec<f32> / Vec<f64>.
// - Kernels read their inputs through the layout (strides, broadcasting),
//   compute in f64 and store the result in the input dtype, row-major.
// - Matmul splits output rows across the rayon thread pool.
// - Random numbers come from a per-thread StdRng; see `manual_seed`.
//
// USAGE:
//   let dev = CpuDevice;
//   let x = CpuTensor::randn((64, 2), DType::F32, &dev)?;

pub mod rng;

use rayon::prelude::*;
use std::fmt;

use wgan_core::backend::{
    Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp,
};
use wgan_core::dtype::DType;
use wgan_core::error::{Error, Result};
use wgan_core::layout::Layout;
use wgan_core::shape::Shape;
use wgan_core::tensor::Tensor;

pub use rng::manual_seed;

/// Convenience alias.
pub type CpuTensor = Tensor<CpuBackend>;

// CpuDevice

/// The host CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

// CpuStorage

/// Host buffer for each supported dtype.
#[derive(Clone)]
pub enum CpuStorage {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl fmt::Debug for CpuStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuStorage::F32(v) => write!(f, "CpuStorage::F32(len={})", v.len()),
            CpuStorage::F64(v) => write!(f, "CpuStorage::F64(len={})", v.len()),
        }
    }
}

impl BackendStorage for CpuStorage {
    fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
        }
    }

    fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
        }
    }
}

impl CpuStorage {
    fn from_f64(data: Vec<f64>, dtype: DType) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(data.into_iter().map(|x| x as f32).collect()),
            DType::F64 => CpuStorage::F64(data),
        }
    }

    fn get(&self, i: usize) -> f64 {
        match self {
            CpuStorage::F32(v) => v[i] as f64,
            CpuStorage::F64(v) => v[i],
        }
    }
}

// Helpers

/// Logical elements of `layout` in row-major order.
fn gather(storage: &CpuStorage, layout: &Layout) -> Result<Vec<f64>> {
    if layout.elem_count() > 0 {
        let last = layout
            .strided_indices()
            .max()
            .unwrap_or(layout.offset());
        if last >= storage.len() {
            return Err(Error::msg(format!(
                "layout reaches index {} but storage holds {} elements",
                last,
                storage.len()
            )));
        }
    }
    if layout.is_contiguous() {
        return Ok(match storage {
            CpuStorage::F32(v) => v[..layout.elem_count()].iter().map(|&x| x as f64).collect(),
            CpuStorage::F64(v) => v[..layout.elem_count()].to_vec(),
        });
    }
    Ok(layout.strided_indices().map(|i| storage.get(i)).collect())
}

/// Elements of `layout` stretched to the broadcast shape `out`.
fn gather_broadcast(storage: &CpuStorage, layout: &Layout, out: &Shape) -> Result<Vec<f64>> {
    let dense = gather(storage, layout)?;
    if layout.shape() == out {
        return Ok(dense);
    }
    let strides = layout.shape().broadcast_strides(out);
    Ok(Layout::new(out.clone(), strides, 0)
        .strided_indices()
        .map(|i| dense[i])
        .collect())
}

fn check_dtypes(lhs: &CpuStorage, rhs: &CpuStorage) -> Result<DType> {
    if lhs.dtype() != rhs.dtype() {
        return Err(Error::DTypeMismatch {
            expected: lhs.dtype(),
            got: rhs.dtype(),
        });
    }
    Ok(lhs.dtype())
}

fn binary_fn(op: BinaryOp) -> fn(f64, f64) -> f64 {
    match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
    }
}

fn unary_fn(op: UnaryOp) -> fn(f64) -> f64 {
    match op {
        UnaryOp::Neg => |x| -x,
        UnaryOp::Exp => f64::exp,
        UnaryOp::Log => f64::ln,
        UnaryOp::Sqrt => f64::sqrt,
        UnaryOp::Square => |x| x * x,
        UnaryOp::Relu => |x| if x > 0.0 { x } else { 0.0 },
        UnaryOp::Sigmoid => |x| 1.0 / (1.0 + (-x).exp()),
        UnaryOp::Tanh => f64::tanh,
    }
}

fn cmp_fn(op: CmpOp) -> fn(f64, f64) -> bool {
    match op {
        CmpOp::Gt => |a, b| a > b,
        CmpOp::Ge => |a, b| a >= b,
    }
}

// CpuBackend

#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn zeros(shape: &Shape, dtype: DType, device: &CpuDevice) -> Result<CpuStorage> {
        Self::full(shape, 0.0, dtype, device)
    }

    fn ones(shape: &Shape, dtype: DType, device: &CpuDevice) -> Result<CpuStorage> {
        Self::full(shape, 1.0, dtype, device)
    }

    fn full(shape: &Shape, val: f64, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        let n = shape.elem_count();
        Ok(match dtype {
            DType::F32 => CpuStorage::F32(vec![val as f32; n]),
            DType::F64 => CpuStorage::F64(vec![val; n]),
        })
    }

    fn from_f64_slice(data: &[f64], dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64(data.to_vec(), dtype))
    }

    fn rand_uniform(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64(rng::uniform(shape.elem_count()), dtype))
    }

    fn rand_normal(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64(rng::normal(shape.elem_count()), dtype))
    }

    fn binary_op(
        op: BinaryOp,
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        let dtype = check_dtypes(lhs, rhs)?;
        let out = Shape::broadcast_shape(lhs_layout.shape(), rhs_layout.shape())?;
        let a = gather_broadcast(lhs, lhs_layout, &out)?;
        let b = gather_broadcast(rhs, rhs_layout, &out)?;
        let f = binary_fn(op);
        let result = a.iter().zip(&b).map(|(&x, &y)| f(x, y)).collect();
        Ok(CpuStorage::from_f64(result, dtype))
    }

    fn unary_op(op: UnaryOp, input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        let f = unary_fn(op);
        let result = gather(input, layout)?.into_iter().map(f).collect();
        Ok(CpuStorage::from_f64(result, input.dtype()))
    }

    fn cmp_op(
        op: CmpOp,
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        let dtype = check_dtypes(lhs, rhs)?;
        let out = Shape::broadcast_shape(lhs_layout.shape(), rhs_layout.shape())?;
        let a = gather_broadcast(lhs, lhs_layout, &out)?;
        let b = gather_broadcast(rhs, rhs_layout, &out)?;
        let f = cmp_fn(op);
        let result = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| if f(x, y) { 1.0 } else { 0.0 })
            .collect();
        Ok(CpuStorage::from_f64(result, dtype))
    }

    fn where_cond(
        mask: &CpuStorage,
        mask_layout: &Layout,
        on_true: &CpuStorage,
        on_true_layout: &Layout,
        on_false: &CpuStorage,
        on_false_layout: &Layout,
    ) -> Result<CpuStorage> {
        let dtype = check_dtypes(on_true, on_false)?;
        let values = Shape::broadcast_shape(on_true_layout.shape(), on_false_layout.shape())?;
        let out = Shape::broadcast_shape(mask_layout.shape(), &values)?;
        let m = gather_broadcast(mask, mask_layout, &out)?;
        let t = gather_broadcast(on_true, on_true_layout, &out)?;
        let f = gather_broadcast(on_false, on_false_layout, &out)?;
        let result = m
            .iter()
            .zip(t.iter().zip(&f))
            .map(|(&c, (&x, &y))| if c != 0.0 { x } else { y })
            .collect();
        Ok(CpuStorage::from_f64(result, dtype))
    }

    fn affine(input: &CpuStorage, layout: &Layout, mul: f64, add: f64) -> Result<CpuStorage> {
        let result = gather(input, layout)?
            .into_iter()
            .map(|x| x * mul + add)
            .collect();
        Ok(CpuStorage::from_f64(result, input.dtype()))
    }

    fn reduce_op(
        op: ReduceOp,
        input: &CpuStorage,
        layout: &Layout,
        dims: &[usize],
        _keep_dim: bool,
    ) -> Result<CpuStorage> {
        let data = gather(input, layout)?;
        let shape = layout.shape();
        let rank = shape.rank();
        for &d in dims {
            if d >= rank {
                return Err(Error::DimOutOfRange { dim: d, rank });
            }
        }
        // Output is laid out like the keep_dim shape; dropping the size-1
        // axes afterwards does not change the element order.
        let out_shape = shape.reduced(dims, true);
        let out_strides = out_shape.stride_contiguous();
        let in_strides = shape.stride_contiguous();
        let reduced: Vec<bool> = (0..rank)
            .map(|d| dims.is_empty() || dims.contains(&d))
            .collect();

        let mut out = vec![0.0f64; out_shape.elem_count()];
        for (flat, &v) in data.iter().enumerate() {
            let mut o = 0;
            for d in 0..rank {
                if !reduced[d] {
                    let coord = (flat / in_strides[d]) % shape.dims()[d];
                    o += coord * out_strides[d];
                }
            }
            out[o] += v;
        }
        if op == ReduceOp::Mean && !out.is_empty() {
            let n = (data.len() / out.len()) as f64;
            out.iter_mut().for_each(|x| *x /= n);
        }
        Ok(CpuStorage::from_f64(out, input.dtype()))
    }

    fn matmul(
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        let dtype = check_dtypes(lhs, rhs)?;
        if lhs_layout.rank() != 2 || rhs_layout.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: lhs_layout.rank().max(rhs_layout.rank()),
            });
        }
        let (m, k) = (lhs_layout.dims()[0], lhs_layout.dims()[1]);
        let (k2, n) = (rhs_layout.dims()[0], rhs_layout.dims()[1]);
        if k != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1: k, k2, n });
        }
        let a = gather(lhs, lhs_layout)?;
        let b = gather(rhs, rhs_layout)?;

        let mut out = vec![0.0f64; m * n];
        if n > 0 {
            out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
                let a_row = &a[i * k..(i + 1) * k];
                for (p, &a_ip) in a_row.iter().enumerate() {
                    let b_row = &b[p * n..(p + 1) * n];
                    for (o, &b_pj) in row.iter_mut().zip(b_row) {
                        *o += a_ip * b_pj;
                    }
                }
            });
        }
        Ok(CpuStorage::from_f64(out, dtype))
    }

    fn to_contiguous(input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64(gather(input, layout)?, input.dtype()))
    }

    fn to_f64_vec(input: &CpuStorage, layout: &Layout) -> Result<Vec<f64>> {
        gather(input, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(data: &[f64], shape: impl Into<Shape>) -> CpuTensor {
        CpuTensor::from_f64_slice(data, shape, DType::F64, &CpuDevice).unwrap()
    }

    #[test]
    fn test_broadcast_mul() {
        let a = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
        let s = t(&[10.0, 100.0], (2, 1));
        let c = a.mul(&s).unwrap();
        assert_eq!(
            c.to_f64_vec().unwrap(),
            vec![10.0, 20.0, 30.0, 400.0, 500.0, 600.0]
        );
    }

    #[test]
    fn test_matmul_transposed_view() {
        // [[1, 2], [3, 4]] @ [[1, 2], [3, 4]]ᵀ
        let a = t(&[1.0, 2.0, 3.0, 4.0], (2, 2));
        let c = a.matmul(&a.t().unwrap()).unwrap();
        assert_eq!(c.to_f64_vec().unwrap(), vec![5.0, 11.0, 11.0, 25.0]);
    }

    #[test]
    fn test_reduce_inner_dims() {
        let x = t(&(0..12).map(|v| v as f64).collect::<Vec<_>>(), (2, 2, 3));
        let s = x.sum_dims(&[1, 2], false).unwrap();
        assert_eq!(s.dims(), &[2]);
        assert_eq!(s.to_f64_vec().unwrap(), vec![15.0, 51.0]);
        let m = x.mean(2, true).unwrap();
        assert_eq!(m.dims(), &[2, 2, 1]);
        assert_eq!(m.to_f64_vec().unwrap(), vec![1.0, 4.0, 7.0, 10.0]);
    }

    #[test]
    fn test_f32_storage_roundtrip() {
        let x = CpuTensor::from_f64_slice(&[0.5, -1.5], 2, DType::F32, &CpuDevice).unwrap();
        assert_eq!(x.dtype(), DType::F32);
        assert_eq!(x.relu().unwrap().to_f64_vec().unwrap(), vec![0.5, 0.0]);
    }

    #[test]
    fn test_dtype_mismatch_rejected() {
        let a = CpuTensor::ones(2, DType::F32, &CpuDevice).unwrap();
        let b = CpuTensor::ones(2, DType::F64, &CpuDevice).unwrap();
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_seeded_randn_is_reproducible() {
        manual_seed(3);
        let a = CpuTensor::randn((4, 2), DType::F64, &CpuDevice).unwrap();
        manual_seed(3);
        let b = CpuTensor::randn((4, 2), DType::F64, &CpuDevice).unwrap();
        assert_eq!(a.to_f64_vec().unwrap(), b.to_f64_vec().unwrap());
    }
}
