use std::fmt;

// Shape — sizes of each tensor dimension
//
//   scalar  []         1 element
//   batch   [n, d]     n * d elements
//   images  [n, c, h, w]
//
// Row-major strides and broadcasting rules are derived from the shape.
// For the GAN the batch dimension is always dim 0; `batch_size()` and
// `per_sample_shape()` exist for that convention.

/// N-dimensional shape of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Product of all dimensions. A scalar shape has one element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Row-major strides: `[2, 3, 4]` → `[12, 4, 1]`.
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut acc = 1;
        let mut strides: Vec<usize> = self
            .0
            .iter()
            .rev()
            .map(|&d| {
                let s = acc;
                acc *= d;
                s
            })
            .collect();
        strides.reverse();
        strides
    }

    /// Size of dimension `d`.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or(crate::Error::DimOutOfRange {
            dim: d,
            rank: self.rank(),
        })
    }

    /// Leading (batch) dimension.
    pub fn batch_size(&self) -> crate::Result<usize> {
        self.dim(0)
    }

    /// Every dimension except the batch dimension.
    pub fn per_sample_shape(&self) -> Shape {
        Shape(self.0.iter().skip(1).copied().collect())
    }

    /// Shape `[batch, 1, ..., 1]` of the same rank, used to broadcast one
    /// scalar per sample over the non-batch axes.
    pub fn per_sample_scalar(&self) -> crate::Result<Shape> {
        let batch = self.batch_size()?;
        let mut dims = vec![1usize; self.rank()];
        dims[0] = batch;
        Ok(Shape(dims))
    }

    /// The shape a reduction over `dims` produces.
    pub fn reduced(&self, dims: &[usize], keep_dim: bool) -> Shape {
        if dims.is_empty() {
            return if keep_dim {
                Shape(vec![1; self.rank()])
            } else {
                Shape(vec![])
            };
        }
        let kept = self.0.iter().enumerate().filter_map(|(i, &d)| {
            if dims.contains(&i) {
                keep_dim.then_some(1)
            } else {
                Some(d)
            }
        });
        Shape(kept.collect())
    }

    /// NumPy broadcasting: align from the right, a dimension of 1 stretches,
    /// missing leading dimensions count as 1.
    ///
    ///   [3, 4] with [4]        → [3, 4]
    ///   [8, 1, 1] with [8, 2, 5] → [8, 2, 5]
    ///   [3] with [4]           → error
    pub fn broadcast_shape(lhs: &Shape, rhs: &Shape) -> crate::Result<Shape> {
        let rank = lhs.rank().max(rhs.rank());
        let padded = |s: &Shape| -> Vec<usize> {
            std::iter::repeat(1)
                .take(rank - s.rank())
                .chain(s.0.iter().copied())
                .collect()
        };
        padded(lhs)
            .into_iter()
            .zip(padded(rhs))
            .map(|(l, r)| match (l, r) {
                _ if l == r => Ok(l),
                (1, r) => Ok(r),
                (l, 1) => Ok(l),
                _ => Err(crate::Error::ShapeMismatch {
                    expected: lhs.clone(),
                    got: rhs.clone(),
                }),
            })
            .collect::<crate::Result<Vec<_>>>()
            .map(Shape)
    }

    /// Strides that read this (contiguous) shape as if it had `target`'s
    /// shape: stretched and missing leading dimensions get stride 0.
    pub fn broadcast_strides(&self, target: &Shape) -> Vec<usize> {
        let lead = target.rank() - self.rank();
        let own = self.stride_contiguous();
        let mut strides = vec![0usize; lead];
        strides.extend(
            self.0
                .iter()
                .zip(&target.0[lead..])
                .zip(own)
                .map(|((&d, &t), s)| if d == t { s } else { 0 }),
        );
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}
