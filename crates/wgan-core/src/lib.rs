//! # wgan-core
//!
//! Tensor primitives and autograd shared by every wgan crate.
//!
//! - [`Tensor`]: n-dimensional array that records the ops producing it
//! - [`Shape`] / [`Layout`]: dimensions, strides and views
//! - [`DType`]: F32 or F64 elements
//! - [`Backend`]: the kernel interface a device crate implements
//! - [`GradStore`]: gradients returned by `backward()`, themselves
//!   differentiable

pub mod backend;
pub mod backprop;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod op;
pub mod shape;
pub mod tensor;

pub use backend::{Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp};
pub use backprop::GradStore;
pub use dtype::DType;
pub use error::{Error, Result};
pub use layout::Layout;
pub use op::{Op, TensorId};
pub use shape::Shape;
pub use tensor::Tensor;
