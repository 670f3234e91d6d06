//! Callable functions over compiled programs
//!
//! - [`FunctionInfo`] - name, signature, parameter names and program
//! - [`PeFunction`] - lazily builds a graph and a parallel executor
//! - [`ExecutorFunction`] - builds eagerly, runs sequentially
//! - [`Layer`] - named functions sharing parameters

pub mod base;
pub mod executor_function;
pub mod function_utils;
pub mod info;
pub mod layer;
pub mod pe_function;

pub use crate::executor::VariableScope;
pub use base::BaseFunction;
pub use executor_function::ExecutorFunction;
pub use function_utils::{
    check_inputs, fetch_outputs, share_into_scope, share_params_into_scope, ParamMap,
};
pub use info::{Argument, FunctionInfo, FunctionSchema};
pub use layer::Layer;
pub use pe_function::PeFunction;
