// Backpropagation — reverse-mode automatic differentiation
//
//   1. The forward pass records an Op on every tensor, forming a DAG.
//   2. backward() orders the DAG so every tensor comes after its inputs.
//   3. Starting from grad(root) = 1, the DAG is walked in reverse and each
//      op's chain rule pushes gradient contributions to its inputs.
//
// A tensor used more than once receives the sum of its contributions.
//
// Every rule below is written with Tensor operations rather than host-side
// arithmetic. The gradients it produces are recorded like any other tensor,
// so a loss built from a gradient (e.g. a gradient-norm penalty) can itself
// be differentiated with respect to the parameters the gradient depends on.
//
// GRADIENT RULES:
//
//   Add:        ga += g,             gb += g
//   Sub:        ga += g,             gb += -g
//   Mul:        ga += g * b,         gb += g * a
//   Div:        ga += g / b,         gb += -g * a / b²
//   Neg:        gx += -g
//   Exp:        gx += g * exp(x)
//   Log:        gx += g / x
//   Sqrt:       gx += g / (2 sqrt(x))
//   Square:     gx += g * 2x
//   Relu:       gx += g * [x > 0]
//   Sigmoid:    gx += g * s (1 - s)
//   Tanh:       gx += g * (1 - t²)
//   Sum/Mean:   gx += broadcast(g) (/ n)
//   Matmul:     gA += g @ Bᵀ,        gB += Aᵀ @ g
//   Reshape, Transpose, Contiguous, Affine: undo the view / scale by mul
//   WhereCond:  route g by the mask; the mask gets nothing
//
// Broadcast inputs receive their gradient summed back to their own shape.

use std::collections::{HashMap, HashSet};

use crate::backend::{Backend, BinaryOp, ReduceOp, UnaryOp};
use crate::error::{Error, Result};
use crate::op::{Op, TensorId};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Gradients of one backward pass, keyed by tensor id.
///
/// Use `grads.get(&tensor)` to retrieve the gradient for any tensor that
/// took part in the graph.
pub struct GradStore<B: Backend> {
    grads: HashMap<TensorId, Tensor<B>>,
}

impl<B: Backend> Clone for GradStore<B> {
    fn clone(&self) -> Self {
        GradStore {
            grads: self.grads.clone(),
        }
    }
}

impl<B: Backend> Default for GradStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> GradStore<B> {
    pub fn new() -> Self {
        GradStore {
            grads: HashMap::new(),
        }
    }

    /// Gradient of `tensor`, if any flowed to it.
    pub fn get(&self, tensor: &Tensor<B>) -> Option<&Tensor<B>> {
        self.grads.get(&tensor.id())
    }

    pub fn get_by_id(&self, id: &TensorId) -> Option<&Tensor<B>> {
        self.grads.get(id)
    }

    /// Replace the gradient stored for `tensor`.
    pub fn insert(&mut self, tensor: &Tensor<B>, grad: Tensor<B>) {
        self.grads.insert(tensor.id(), grad);
    }

    pub fn remove(&mut self, tensor: &Tensor<B>) -> Option<Tensor<B>> {
        self.grads.remove(&tensor.id())
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    /// Add `grad` to whatever has been accumulated for `id` so far.
    pub fn accumulate(&mut self, id: TensorId, grad: Tensor<B>) -> Result<()> {
        let merged = match self.grads.get(&id) {
            Some(existing) => existing.add(&grad)?,
            None => grad,
        };
        self.grads.insert(id, merged);
        Ok(())
    }
}

/// Topological order of the graph below `root`: inputs before outputs.
///
/// Iterative post-order DFS; graphs that contain a gradient of a gradient get
/// deep enough that recursion is not worth the risk.
fn build_topo<B: Backend>(root: &Tensor<B>) -> Vec<Tensor<B>> {
    let mut visited: HashSet<TensorId> = HashSet::new();
    let mut order = Vec::new();
    // (tensor, inputs already pushed)
    let mut stack: Vec<(Tensor<B>, bool)> = vec![(root.clone(), false)];

    while let Some((t, expanded)) = stack.pop() {
        if expanded {
            order.push(t);
            continue;
        }
        if !visited.insert(t.id()) {
            continue;
        }
        let inputs: Vec<Tensor<B>> = t.op().inputs().into_iter().cloned().collect();
        stack.push((t, true));
        for input in inputs.into_iter().rev() {
            if !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }
    order
}

/// Gradients of the scalar `root` with respect to every tensor in its graph.
pub fn backward<B: Backend>(root: &Tensor<B>) -> Result<GradStore<B>> {
    if root.elem_count() != 1 {
        return Err(Error::NotAScalar {
            shape: root.shape().clone(),
        });
    }

    let topo = build_topo(root);

    let mut grads = GradStore::new();
    let seed = Tensor::<B>::ones(root.shape().clone(), root.dtype(), root.device())?;
    grads.grads.insert(root.id(), seed);

    for tensor in topo.iter().rev() {
        let grad_output = match grads.get_by_id(&tensor.id()) {
            Some(g) => g.clone(),
            None => continue,
        };

        match tensor.op() {
            Op::None => {}

            Op::Contiguous { input } => {
                grads.accumulate(input.id(), grad_output)?;
            }

            Op::Binary { lhs, rhs, op } => {
                compute_binary_grad(*op, &grad_output, lhs, rhs, &mut grads)?;
            }

            Op::Unary { input, op } => {
                compute_unary_grad(*op, &grad_output, input, tensor, &mut grads)?;
            }

            Op::Reduce {
                input,
                op,
                dims,
                keep_dim,
            } => {
                compute_reduce_grad(*op, &grad_output, input, dims, *keep_dim, &mut grads)?;
            }

            Op::Matmul { lhs, rhs } => {
                let grad_lhs = grad_output.matmul(&rhs.t()?)?;
                let grad_rhs = lhs.t()?.matmul(&grad_output)?;
                grads.accumulate(lhs.id(), grad_lhs)?;
                grads.accumulate(rhs.id(), grad_rhs)?;
            }

            Op::Reshape { input, src_shape } => {
                let grad = grad_output.reshape(src_shape.clone())?;
                grads.accumulate(input.id(), grad)?;
            }

            Op::Transpose { input, dim0, dim1 } => {
                let grad = grad_output.transpose(*dim0, *dim1)?;
                grads.accumulate(input.id(), grad)?;
            }

            Op::Affine { input, mul, .. } => {
                let grad = grad_output.affine(*mul, 0.0)?;
                grads.accumulate(input.id(), grad)?;
            }

            Op::WhereCond {
                mask,
                on_true,
                on_false,
            } => {
                let zeros = Tensor::<B>::zeros_like(&grad_output)?;
                let grad_true = Tensor::where_cond(mask, &grad_output, &zeros)?;
                let grad_false = Tensor::where_cond(mask, &zeros, &grad_output)?;
                grads.accumulate(
                    on_true.id(),
                    reduce_broadcast_grad(&grad_true, on_true.shape())?,
                )?;
                grads.accumulate(
                    on_false.id(),
                    reduce_broadcast_grad(&grad_false, on_false.shape())?,
                )?;
            }
        }
    }

    Ok(grads)
}

fn compute_binary_grad<B: Backend>(
    op: BinaryOp,
    grad_output: &Tensor<B>,
    lhs: &Tensor<B>,
    rhs: &Tensor<B>,
    grads: &mut GradStore<B>,
) -> Result<()> {
    let (grad_lhs, grad_rhs) = match op {
        BinaryOp::Add => (grad_output.clone(), grad_output.clone()),
        BinaryOp::Sub => (grad_output.clone(), grad_output.neg()?),
        BinaryOp::Mul => (grad_output.mul(rhs)?, grad_output.mul(lhs)?),
        BinaryOp::Div => {
            let grad_lhs = grad_output.div(rhs)?;
            let grad_rhs = grad_output
                .mul(lhs)?
                .div(&rhs.square()?)?
                .neg()?;
            (grad_lhs, grad_rhs)
        }
    };
    grads.accumulate(lhs.id(), reduce_broadcast_grad(&grad_lhs, lhs.shape())?)?;
    grads.accumulate(rhs.id(), reduce_broadcast_grad(&grad_rhs, rhs.shape())?)?;
    Ok(())
}

/// Sum `grad` (shaped like the broadcast result) back down to `target`.
///
///   grad [8, 2, 5], target [8, 1, 1] → sum dims 1, 2 (keep) → [8, 1, 1]
///   grad [3, 4],    target [4]       → sum dim 0          → [4]
fn reduce_broadcast_grad<B: Backend>(grad: &Tensor<B>, target: &Shape) -> Result<Tensor<B>> {
    if grad.shape() == target {
        return Ok(grad.clone());
    }
    let grad_dims = grad.dims();
    let target_dims = target.dims();
    let lead = grad_dims.len() - target_dims.len();

    let mut sum_dims: Vec<usize> = (0..lead).collect();
    for (i, &td) in target_dims.iter().enumerate() {
        if td == 1 && grad_dims[i + lead] != 1 {
            sum_dims.push(i + lead);
        }
    }

    let summed = if sum_dims.is_empty() {
        grad.clone()
    } else {
        grad.sum_dims(&sum_dims, true)?
    };
    summed.reshape(target.clone())
}

/// `out` is the tensor the unary op produced; several rules reuse it.
fn compute_unary_grad<B: Backend>(
    op: UnaryOp,
    grad_output: &Tensor<B>,
    input: &Tensor<B>,
    out: &Tensor<B>,
    grads: &mut GradStore<B>,
) -> Result<()> {
    let grad = match op {
        UnaryOp::Neg => grad_output.neg()?,
        UnaryOp::Exp => grad_output.mul(out)?,
        UnaryOp::Log => grad_output.div(input)?,
        UnaryOp::Sqrt => grad_output.div(&out.scale(2.0)?)?,
        UnaryOp::Square => grad_output.mul(&input.scale(2.0)?)?,
        UnaryOp::Relu => {
            let zeros = Tensor::<B>::zeros_like(input)?;
            let mask = input.gt(&zeros)?;
            grad_output.mul(&mask)?
        }
        UnaryOp::Sigmoid => {
            // s * (1 - s)
            let ds = out.mul(&out.affine(-1.0, 1.0)?)?;
            grad_output.mul(&ds)?
        }
        UnaryOp::Tanh => {
            // 1 - t²
            let dt = out.square()?.affine(-1.0, 1.0)?;
            grad_output.mul(&dt)?
        }
    };
    grads.accumulate(input.id(), grad)
}

fn compute_reduce_grad<B: Backend>(
    op: ReduceOp,
    grad_output: &Tensor<B>,
    input: &Tensor<B>,
    dims: &[usize],
    keep_dim: bool,
    grads: &mut GradStore<B>,
) -> Result<()> {
    // Bring the gradient back to rank(input) with 1s on the reduced axes,
    // then stretch it over the input shape.
    let kept_shape = input.shape().reduced(dims, true);
    let g = if keep_dim && grad_output.shape() == &kept_shape {
        grad_output.clone()
    } else {
        grad_output.reshape(kept_shape)?
    };
    let ones = Tensor::<B>::ones_like(input)?;
    let expanded = g.mul(&ones)?;

    let grad = match op {
        ReduceOp::Sum => expanded,
        ReduceOp::Mean => {
            let n: usize = if dims.is_empty() {
                input.elem_count()
            } else {
                dims.iter().map(|&d| input.dims()[d]).product()
            };
            expanded.scale(1.0 / n as f64)?
        }
    };
    grads.accumulate(input.id(), grad)
}
