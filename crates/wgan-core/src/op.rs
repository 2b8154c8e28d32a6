// Op — how a tensor was produced
//
// Every tensor records the operation that created it together with handles to
// its inputs. The records form a DAG that backward() walks in reverse.
//
//   c = a * b
//     a.op = Op::None
//     b.op = Op::None
//     c.op = Op::Binary { lhs: a, rhs: b, op: Mul }
//
// Inputs are stored as Tensor<B> (an Arc handle), so the graph keeps every
// value the chain rule needs alive for as long as the output exists.
//
// Gradients are themselves built from recorded ops. A gradient returned by
// backward() therefore carries its own graph and can be differentiated again,
// which is what the gradient penalty of the critic relies on.

use crate::backend::{Backend, BinaryOp, ReduceOp, UnaryOp};

/// Unique identifier for a tensor. Used as keys in GradStore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) u64);

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorId {
    /// Next id from a global atomic counter.
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Records the operation that produced a tensor.
pub enum Op<B: Backend> {
    /// Leaf: input data, a parameter, a constant or a detached value.
    None,

    /// Element-wise binary with broadcasting: result = op(lhs, rhs)
    Binary {
        lhs: crate::Tensor<B>,
        rhs: crate::Tensor<B>,
        op: BinaryOp,
    },

    /// Element-wise unary: result = op(input)
    Unary {
        input: crate::Tensor<B>,
        op: UnaryOp,
    },

    /// Reduction over `dims` (all dims when empty).
    Reduce {
        input: crate::Tensor<B>,
        op: ReduceOp,
        dims: Vec<usize>,
        keep_dim: bool,
    },

    /// 2-D matrix product: result = lhs @ rhs
    Matmul {
        lhs: crate::Tensor<B>,
        rhs: crate::Tensor<B>,
    },

    /// Same data viewed with another shape.
    Reshape {
        input: crate::Tensor<B>,
        src_shape: crate::Shape,
    },

    /// Swap of two dimensions.
    Transpose {
        input: crate::Tensor<B>,
        dim0: usize,
        dim1: usize,
    },

    /// result = input * mul + add
    Affine {
        input: crate::Tensor<B>,
        mul: f64,
        add: f64,
    },

    /// Row-major copy of a strided view.
    Contiguous { input: crate::Tensor<B> },

    /// result[i] = if mask[i] { on_true[i] } else { on_false[i] }
    WhereCond {
        mask: crate::Tensor<B>,
        on_true: crate::Tensor<B>,
        on_false: crate::Tensor<B>,
    },
}

impl<B: Backend> Clone for Op<B> {
    fn clone(&self) -> Self {
        match self {
            Op::None => Op::None,
            Op::Binary { lhs, rhs, op } => Op::Binary {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
                op: *op,
            },
            Op::Unary { input, op } => Op::Unary {
                input: input.clone(),
                op: *op,
            },
            Op::Reduce {
                input,
                op,
                dims,
                keep_dim,
            } => Op::Reduce {
                input: input.clone(),
                op: *op,
                dims: dims.clone(),
                keep_dim: *keep_dim,
            },
            Op::Matmul { lhs, rhs } => Op::Matmul {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            Op::Reshape { input, src_shape } => Op::Reshape {
                input: input.clone(),
                src_shape: src_shape.clone(),
            },
            Op::Transpose { input, dim0, dim1 } => Op::Transpose {
                input: input.clone(),
                dim0: *dim0,
                dim1: *dim1,
            },
            Op::Affine { input, mul, add } => Op::Affine {
                input: input.clone(),
                mul: *mul,
                add: *add,
            },
            Op::Contiguous { input } => Op::Contiguous {
                input: input.clone(),
            },
            Op::WhereCond {
                mask,
                on_true,
                on_false,
            } => Op::WhereCond {
                mask: mask.clone(),
                on_true: on_true.clone(),
                on_false: on_false.clone(),
            },
        }
    }
}

impl<B: Backend> std::fmt::Debug for Op<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::None => write!(f, "None"),
            Op::Binary { lhs, rhs, op } => {
                write!(f, "Binary({:?}, {:?}, {:?})", op, lhs.id(), rhs.id())
            }
            Op::Unary { input, op } => write!(f, "Unary({:?}, {:?})", op, input.id()),
            Op::Reduce {
                input,
                op,
                dims,
                keep_dim,
            } => write!(
                f,
                "Reduce({:?}, {:?}, dims={:?}, keep_dim={})",
                op,
                input.id(),
                dims,
                keep_dim
            ),
            Op::Matmul { lhs, rhs } => write!(f, "Matmul({:?}, {:?})", lhs.id(), rhs.id()),
            Op::Reshape { input, src_shape } => {
                write!(f, "Reshape({:?}, from={})", input.id(), src_shape)
            }
            Op::Transpose { input, dim0, dim1 } => {
                write!(f, "Transpose({:?}, {}, {})", input.id(), dim0, dim1)
            }
            Op::Affine { input, mul, add } => {
                write!(f, "Affine({:?}, mul={}, add={})", input.id(), mul, add)
            }
            Op::Contiguous { input } => write!(f, "Contiguous({:?})", input.id()),
            Op::WhereCond {
                mask,
                on_true,
                on_false,
            } => write!(
                f,
                "WhereCond({:?}, {:?}, {:?})",
                mask.id(),
                on_true.id(),
                on_false.id()
            ),
        }
    }
}

impl<B: Backend> Op<B> {
    /// Input tensors of this op, in a stable order. Used for the topological
    /// sort in backward().
    pub fn inputs(&self) -> Vec<&crate::Tensor<B>> {
        match self {
            Op::None => vec![],
            Op::Binary { lhs, rhs, .. } | Op::Matmul { lhs, rhs } => vec![lhs, rhs],
            Op::Unary { input, .. }
            | Op::Reduce { input, .. }
            | Op::Reshape { input, .. }
            | Op::Transpose { input, .. }
            | Op::Affine { input, .. }
            | Op::Contiguous { input } => vec![input],
            Op::WhereCond {
                mask,
                on_true,
                on_false,
            } => vec![mask, on_true, on_false],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Op::None)
    }
}
