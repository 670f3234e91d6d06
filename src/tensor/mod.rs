//! Tensor data model
//!
//! - [`DType`] / [`Element`] - runtime element tags and the scalar types kernels instantiate for
//! - [`Backend`], [`DataLayout`], [`Place`] - what a kernel runs on and what it accepts
//! - [`DenseTensor`] - dense buffer with shape and placement
//! - [`Tensor`] - named shared handle over a dense tensor
//! - [`DeviceContext`] - per-call device handle passed to kernels

pub mod dense;
pub mod dtype;
pub mod place;

pub use dense::{DenseTensor, Tensor, TensorData, TensorLiteral, MAX_EXACT_INT};
pub use dtype::{DType, Element};
pub use place::{Backend, DataLayout, DeviceContext, Place, MAX_DEVICES};
