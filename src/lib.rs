//! kernforge - device-polymorphic kernel dispatch and parallel graph execution
//!
//! Operators are registered once per (backend, layout, element type) in a
//! process-wide [`KernelRegistry`]. Programs are compiled into an immutable
//! [`ExecutionGraph`] and run by a [`ParallelExecutor`]; [`PeFunction`]
//! wraps both behind a reusable call interface.
//!
//! GPU and KPS kernels are compiled in with the `gpu` and `kps` features.

#![allow(clippy::needless_range_loop)] // Index loops mirror the axis math
#![allow(clippy::type_complexity)] // Kernel signatures are function pointers over borrowed args
#![allow(clippy::len_without_is_empty)]

pub mod error;
pub mod executor;
pub mod graph;
pub mod jit;
pub mod kernels;
pub mod logging;
pub mod tensor;

pub use error::{ErrorCategory, ForgeResult, KernForgeError};
pub use executor::{ExecutionStrategy, ExecutorState, ParallelExecutor, RunStats, VariableScope};
pub use graph::{ExecutionGraph, OpDesc, ProgramDesc};
pub use jit::{BaseFunction, ExecutorFunction, FunctionInfo, FunctionSchema, Layer, PeFunction};
pub use kernels::{global_registry, KernelKey, KernelRegistry};
pub use tensor::{Backend, DType, DataLayout, DenseTensor, Place, Tensor};
