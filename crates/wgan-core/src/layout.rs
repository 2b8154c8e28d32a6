use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout — how a logical shape maps onto flat storage
//
// A layout is shape + strides + offset. Transposing only swaps strides, so
// `weight.t()` inside a Linear layer costs nothing until a kernel reads it;
// kernels that need row-major data walk `strided_indices()`.

/// Shape, strides and starting offset of a tensor view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    offset: usize,
}

impl Layout {
    /// Row-major layout with zero offset.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Layout with explicit strides and offset (views).
    pub fn new(shape: Shape, strides: Vec<usize>, offset: usize) -> Self {
        Layout {
            shape,
            strides,
            offset,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// Row-major strides and no offset.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.strides == self.shape.stride_contiguous()
    }

    /// Swap two dimensions without moving data.
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Layout> {
        let rank = self.rank();
        if dim0 >= rank || dim1 >= rank {
            return Err(Error::DimOutOfRange {
                dim: dim0.max(dim1),
                rank,
            });
        }
        let mut new_dims = self.shape.dims().to_vec();
        let mut new_strides = self.strides.clone();
        new_dims.swap(dim0, dim1);
        new_strides.swap(dim0, dim1);
        Ok(Layout::new(Shape::new(new_dims), new_strides, self.offset))
    }

    /// Storage indices of every element, in logical row-major order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }
}

/// Yields the storage index of each logical element of a layout.
///
/// Keeps a running storage position: stepping the last axis adds its
/// stride, and a carry rewinds the exhausted axis before moving on.
pub struct StridedIter {
    index: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    pos: usize,
    remaining: usize,
}

impl StridedIter {
    fn new(layout: &Layout) -> Self {
        StridedIter {
            index: vec![0; layout.rank()],
            dims: layout.dims().to_vec(),
            strides: layout.strides().to_vec(),
            pos: layout.offset(),
            remaining: layout.elem_count(),
        }
    }

    fn step(&mut self) {
        for axis in (0..self.dims.len()).rev() {
            self.index[axis] += 1;
            self.pos += self.strides[axis];
            if self.index[axis] < self.dims[axis] {
                return;
            }
            self.pos -= self.dims[axis] * self.strides[axis];
            self.index[axis] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let here = self.pos;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.step();
        }
        Some(here)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_indices() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        assert!(layout.is_contiguous());
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_transpose_indices() {
        // [[0, 1, 2], [3, 4, 5]] read as its transpose
        let layout = Layout::contiguous(Shape::from((2, 3)));
        let transposed = layout.transpose(0, 1).unwrap();
        assert_eq!(transposed.dims(), &[3, 2]);
        assert!(!transposed.is_contiguous());
        let indices: Vec<usize> = transposed.strided_indices().collect();
        assert_eq!(indices, vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_scalar_layout_yields_one_index() {
        let layout = Layout::contiguous(Shape::from(()));
        assert_eq!(layout.strided_indices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_offset_view_with_padding_stride() {
        // 2x2 window starting at column 1 of a 2x3 buffer
        let layout = Layout::new(Shape::from((2, 2)), vec![3, 1], 1);
        let indices: Vec<usize> = layout.strided_indices().collect();
        assert_eq!(indices, vec![1, 2, 4, 5]);
        assert_eq!(layout.strided_indices().len(), 4);
    }

    #[test]
    fn test_transpose_out_of_range() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        assert!(layout.transpose(0, 2).is_err());
    }
}
