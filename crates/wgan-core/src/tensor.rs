use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::{Backend, BinaryOp, CmpOp, ReduceOp, UnaryOp};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::op::{Op, TensorId};
use crate::shape::Shape;

// Tensor — n-dimensional array with a recorded history
//
// A tensor is a cheap handle (Arc) around:
//
//   storage  Arc<RwLock<B::Storage>>   shared by views and clones
//   layout   shape + strides + offset
//   op       how the tensor was produced (Op::None for leaves)
//
// Every operation records its inputs, so any tensor can be differentiated
// with backward(). Gradients come back as ordinary recorded tensors, which
// makes a second differentiation pass through them possible.
//
// Parameters are leaves marked with set_variable(). Optimizers write their
// new values with update_data_inplace(), which swaps the storage behind the
// shared lock so every clone held by a layer sees the update.

struct TensorInner<B: Backend> {
    id: TensorId,
    storage: Arc<RwLock<B::Storage>>,
    layout: Layout,
    dtype: DType,
    device: B::Device,
    op: Op<B>,
    /// Trainable parameter or an input we differentiate with respect to.
    is_variable: bool,
}

/// An n-dimensional array of numbers on a specific backend.
///
/// # Example
/// ```ignore
/// use wgan_core::{DType, Tensor};
/// use wgan_cpu::{CpuBackend, CpuDevice};
///
/// let dev = CpuDevice;
/// let a = Tensor::<CpuBackend>::from_f64_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2), DType::F32, &dev)?;
/// let b = Tensor::<CpuBackend>::ones((2, 2), DType::F32, &dev)?;
/// let c = a.add(&b)?;
/// ```
pub struct Tensor<B: Backend> {
    inner: Arc<TensorInner<B>>,
}

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(id={:?}, shape={}, dtype={}, device={:?})",
            self.inner.id,
            self.inner.layout.shape(),
            self.inner.dtype,
            self.inner.device,
        )
    }
}

impl<B: Backend> Tensor<B> {
    // Internal constructors

    pub(crate) fn from_storage(
        storage: B::Storage,
        layout: Layout,
        dtype: DType,
        device: B::Device,
        op: Op<B>,
    ) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                id: TensorId::new(),
                storage: Arc::new(RwLock::new(storage)),
                layout,
                dtype,
                device,
                op,
                is_variable: false,
            }),
        }
    }

    /// New tensor sharing this tensor's storage under another layout.
    fn view_with_layout(&self, layout: Layout, op: Op<B>) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                id: TensorId::new(),
                storage: Arc::clone(&self.inner.storage),
                layout,
                dtype: self.inner.dtype,
                device: self.inner.device.clone(),
                op,
                is_variable: false,
            }),
        }
    }

    /// Same id, storage and history; only the variable flag changes.
    fn with_variable_flag(&self, is_variable: bool) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                id: self.inner.id,
                storage: Arc::clone(&self.inner.storage),
                layout: self.inner.layout.clone(),
                dtype: self.inner.dtype,
                device: self.inner.device.clone(),
                op: self.inner.op.clone(),
                is_variable,
            }),
        }
    }

    // Accessors

    pub fn id(&self) -> TensorId {
        self.inner.id
    }

    pub fn shape(&self) -> &Shape {
        self.inner.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.layout.dims()
    }

    pub fn rank(&self) -> usize {
        self.inner.layout.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn device(&self) -> &B::Device {
        &self.inner.device
    }

    pub fn layout(&self) -> &Layout {
        &self.inner.layout
    }

    pub fn is_contiguous(&self) -> bool {
        self.inner.layout.is_contiguous()
    }

    /// Whether this tensor is a trainable leaf.
    pub fn is_variable(&self) -> bool {
        self.inner.is_variable
    }

    /// The op that created this tensor.
    pub fn op(&self) -> &Op<B> {
        &self.inner.op
    }

    fn read_storage(&self) -> Result<RwLockReadGuard<'_, B::Storage>> {
        self.inner
            .storage
            .read()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, B::Storage>> {
        self.inner
            .storage
            .write()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    // In-place mutation

    /// Overwrite the values of this tensor without changing its id or shape.
    ///
    /// The new storage is written behind the shared lock, so clones held by a
    /// layer observe the update. `new_data` is in logical row-major order and
    /// must have exactly `elem_count()` values.
    pub fn update_data_inplace(&self, new_data: &[f64]) -> Result<()> {
        let expected = self.elem_count();
        if new_data.len() != expected {
            return Err(Error::ElementCountMismatch {
                shape: self.shape().clone(),
                expected,
                got: new_data.len(),
            });
        }
        if !self.is_contiguous() {
            crate::bail!("update_data_inplace: tensor {:?} is a strided view", self.id());
        }
        let new_storage = B::from_f64_slice(new_data, self.dtype(), self.device())?;
        let mut guard = self.write_storage()?;
        *guard = new_storage;
        Ok(())
    }

    // Creation methods

    fn leaf(storage: B::Storage, shape: Shape, dtype: DType, device: &B::Device) -> Self {
        Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
            Op::None,
        )
    }

    pub fn zeros(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::zeros(&shape, dtype, device)?;
        Ok(Self::leaf(storage, shape, dtype, device))
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::ones(&shape, dtype, device)?;
        Ok(Self::leaf(storage, shape, dtype, device))
    }

    /// Tensor from row-major host data.
    pub fn from_f64_slice(
        data: &[f64],
        shape: impl Into<Shape>,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let storage = B::from_f64_slice(data, dtype, device)?;
        Ok(Self::leaf(storage, shape, dtype, device))
    }

    /// Uniform samples in [0, 1).
    pub fn rand(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_uniform(&shape, dtype, device)?;
        Ok(Self::leaf(storage, shape, dtype, device))
    }

    /// Standard normal samples.
    pub fn randn(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_normal(&shape, dtype, device)?;
        Ok(Self::leaf(storage, shape, dtype, device))
    }

    pub fn zeros_like(other: &Self) -> Result<Self> {
        Self::zeros(other.shape().clone(), other.dtype(), other.device())
    }

    pub fn ones_like(other: &Self) -> Result<Self> {
        Self::ones(other.shape().clone(), other.dtype(), other.device())
    }

    /// Mark this tensor as a variable (trainable parameter).
    pub fn set_variable(self) -> Self {
        self.with_variable_flag(true)
    }

    // Shape manipulation

    /// Swap two dimensions (no data copy).
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let new_layout = self.inner.layout.transpose(dim0, dim1)?;
        let op = Op::Transpose {
            input: self.clone(),
            dim0,
            dim1,
        };
        Ok(self.view_with_layout(new_layout, op))
    }

    /// Transpose of a 2-D matrix.
    pub fn t(&self) -> Result<Self> {
        if self.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: self.rank(),
            });
        }
        self.transpose(0, 1)
    }

    /// View with a new shape of the same element count. Strided views are
    /// copied to row-major first.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        let current_count = self.elem_count();
        let new_count = new_shape.elem_count();
        if current_count != new_count {
            return Err(Error::ReshapeElementMismatch {
                src: current_count,
                dst: new_count,
                dst_shape: new_shape,
            });
        }
        let tensor = self.contiguous()?;
        let op = Op::Reshape {
            input: tensor.clone(),
            src_shape: tensor.shape().clone(),
        };
        Ok(tensor.view_with_layout(Layout::contiguous(new_shape), op))
    }

    /// Row-major copy, or a cheap clone when already contiguous.
    pub fn contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        let storage = self.read_storage()?;
        let new_storage = B::to_contiguous(&storage, &self.inner.layout)?;
        Ok(Self::from_storage(
            new_storage,
            Layout::contiguous(self.shape().clone()),
            self.inner.dtype,
            self.inner.device.clone(),
            Op::Contiguous {
                input: self.clone(),
            },
        ))
    }

    /// Collapse every dimension after the first: `[n, a, b]` → `[n, a*b]`.
    pub fn flatten_batch(&self) -> Result<Self> {
        let batch = self.shape().batch_size()?;
        let rest = self.shape().per_sample_shape().elem_count();
        self.reshape((batch, rest))
    }

    // Arithmetic operations

    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Add)
    }

    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Sub)
    }

    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Mul)
    }

    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Div)
    }

    /// Multiply by a constant.
    pub fn scale(&self, factor: f64) -> Result<Self> {
        self.affine(factor, 0.0)
    }

    fn binary_op(&self, rhs: &Self, op: BinaryOp) -> Result<Self> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        let result_shape = Shape::broadcast_shape(self.shape(), rhs.shape())?;
        let result = {
            let storage_lhs = self.read_storage()?;
            let storage_rhs = rhs.read_storage()?;
            B::binary_op(
                op,
                &storage_lhs,
                &self.inner.layout,
                &storage_rhs,
                &rhs.inner.layout,
            )?
        };
        let result_op = Op::Binary {
            lhs: self.clone(),
            rhs: rhs.clone(),
            op,
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(result_shape),
            self.inner.dtype,
            self.inner.device.clone(),
            result_op,
        ))
    }

    // Comparison operations

    pub fn gt(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Gt)
    }

    pub fn ge(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Ge)
    }

    /// Comparisons yield 0/1 masks in the input dtype and are not
    /// differentiable (Op::None).
    fn cmp_op(&self, rhs: &Self, op: CmpOp) -> Result<Self> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        let result_shape = Shape::broadcast_shape(self.shape(), rhs.shape())?;
        let result = {
            let storage_lhs = self.read_storage()?;
            let storage_rhs = rhs.read_storage()?;
            B::cmp_op(
                op,
                &storage_lhs,
                &self.inner.layout,
                &storage_rhs,
                &rhs.inner.layout,
            )?
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(result_shape),
            self.inner.dtype,
            self.inner.device.clone(),
            Op::None,
        ))
    }

    // Unary operations

    pub fn neg(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Neg)
    }

    pub fn exp(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Exp)
    }

    pub fn log(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Log)
    }

    pub fn sqrt(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sqrt)
    }

    pub fn square(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Square)
    }

    pub fn relu(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Relu)
    }

    pub fn sigmoid(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sigmoid)
    }

    pub fn tanh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Tanh)
    }

    fn unary_op(&self, op: UnaryOp) -> Result<Self> {
        let result = {
            let storage = self.read_storage()?;
            B::unary_op(op, &storage, &self.inner.layout)?
        };
        let result_op = Op::Unary {
            input: self.clone(),
            op,
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(self.shape().clone()),
            self.inner.dtype,
            self.inner.device.clone(),
            result_op,
        ))
    }

    /// `result[i] = if mask[i] != 0 { on_true[i] } else { on_false[i] }`,
    /// broadcasting all three operands.
    pub fn where_cond(mask: &Self, on_true: &Self, on_false: &Self) -> Result<Self> {
        if on_true.dtype() != on_false.dtype() {
            return Err(Error::DTypeMismatch {
                expected: on_true.dtype(),
                got: on_false.dtype(),
            });
        }
        let values_shape = Shape::broadcast_shape(on_true.shape(), on_false.shape())?;
        let result_shape = Shape::broadcast_shape(mask.shape(), &values_shape)?;
        let result = {
            let mask_s = mask.read_storage()?;
            let true_s = on_true.read_storage()?;
            let false_s = on_false.read_storage()?;
            B::where_cond(
                &mask_s,
                &mask.inner.layout,
                &true_s,
                &on_true.inner.layout,
                &false_s,
                &on_false.inner.layout,
            )?
        };
        let result_op = Op::WhereCond {
            mask: mask.clone(),
            on_true: on_true.clone(),
            on_false: on_false.clone(),
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(result_shape),
            on_true.inner.dtype,
            on_true.inner.device.clone(),
            result_op,
        ))
    }

    // Reductions

    /// Sum of all elements as a scalar tensor.
    pub fn sum_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, &[], false)
    }

    pub fn sum(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, &[dim], keep_dim)
    }

    /// Sum over several dimensions at once. An empty `dims` sums everything.
    pub fn sum_dims(&self, dims: &[usize], keep_dim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, dims, keep_dim)
    }

    /// Mean of all elements as a scalar tensor.
    pub fn mean_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Mean, &[], false)
    }

    pub fn mean(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Mean, &[dim], keep_dim)
    }

    pub fn mean_dims(&self, dims: &[usize], keep_dim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Mean, dims, keep_dim)
    }

    fn reduce_op(&self, op: ReduceOp, dims: &[usize], keep_dim: bool) -> Result<Self> {
        for &d in dims {
            if d >= self.rank() {
                return Err(Error::DimOutOfRange {
                    dim: d,
                    rank: self.rank(),
                });
            }
        }
        if self.elem_count() == 0 && op == ReduceOp::Mean {
            crate::bail!("mean of an empty tensor with shape {}", self.shape());
        }
        let result = {
            let storage = self.read_storage()?;
            B::reduce_op(op, &storage, &self.inner.layout, dims, keep_dim)?
        };
        let result_shape = self.shape().reduced(dims, keep_dim);
        let result_op = Op::Reduce {
            input: self.clone(),
            op,
            dims: dims.to_vec(),
            keep_dim,
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(result_shape),
            self.inner.dtype,
            self.inner.device.clone(),
            result_op,
        ))
    }

    // Matrix multiplication

    /// `[m, k] @ [k, n] → [m, n]`.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        if self.rank() != 2 || rhs.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: if self.rank() != 2 {
                    self.rank()
                } else {
                    rhs.rank()
                },
            });
        }
        let (m, k1) = (self.dims()[0], self.dims()[1]);
        let (k2, n) = (rhs.dims()[0], rhs.dims()[1]);
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }
        let result = {
            let storage_lhs = self.read_storage()?;
            let storage_rhs = rhs.read_storage()?;
            B::matmul(
                &storage_lhs,
                &self.inner.layout,
                &storage_rhs,
                &rhs.inner.layout,
            )?
        };
        let result_op = Op::Matmul {
            lhs: self.clone(),
            rhs: rhs.clone(),
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(Shape::from((m, n))),
            self.inner.dtype,
            self.inner.device.clone(),
            result_op,
        ))
    }

    // Affine transform

    /// `result[i] = self[i] * mul + add`.
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self> {
        let result = {
            let storage = self.read_storage()?;
            B::affine(&storage, &self.inner.layout, mul, add)?
        };
        let result_op = Op::Affine {
            input: self.clone(),
            mul,
            add,
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(self.shape().clone()),
            self.inner.dtype,
            self.inner.device.clone(),
            result_op,
        ))
    }

    // Data extraction

    /// All elements in logical row-major order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let storage = self.read_storage()?;
        B::to_f64_vec(&storage, &self.inner.layout)
    }

    /// Value of a single-element tensor.
    pub fn to_scalar_f64(&self) -> Result<f64> {
        if self.elem_count() != 1 {
            return Err(Error::NotAScalar {
                shape: self.shape().clone(),
            });
        }
        let vec = self.to_f64_vec()?;
        Ok(vec[0])
    }

    // Autograd

    /// Reverse-mode differentiation of this scalar tensor.
    ///
    /// The returned gradients are recorded tensors: they can enter a new loss
    /// and be differentiated again.
    ///
    /// # Example
    /// ```ignore
    /// let a = Tensor::from_f64_slice(&[2.0], 1, DType::F64, &dev)?.set_variable();
    /// let b = Tensor::from_f64_slice(&[3.0], 1, DType::F64, &dev)?.set_variable();
    /// let grads = a.mul(&b)?.sum_all()?.backward()?;
    /// // grad_a = 3.0, grad_b = 2.0
    /// ```
    pub fn backward(&self) -> Result<crate::backprop::GradStore<B>> {
        crate::backprop::backward(self)
    }

    /// Gradients of this scalar tensor with respect to each of `inputs`,
    /// in order. Fails with [`Error::NoGradient`] for an input that does not
    /// influence this tensor.
    pub fn grad_wrt(&self, inputs: &[&Tensor<B>]) -> Result<Vec<Tensor<B>>> {
        let grads = self.backward()?;
        inputs
            .iter()
            .map(|t| {
                grads
                    .get(t)
                    .cloned()
                    .ok_or_else(|| Error::NoGradient(format!("{:?}", t.id())))
            })
            .collect()
    }

    /// Same values, fresh id, no history.
    pub fn detach(&self) -> Self {
        self.view_with_layout(self.layout().clone(), Op::None)
    }
}
