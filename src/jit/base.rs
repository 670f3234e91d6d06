use std::sync::Arc;

use super::info::FunctionInfo;
use crate::error::ForgeResult;
use crate::tensor::{DenseTensor, Tensor};

/// A callable compiled function.
///
/// Both call forms bind the inputs positionally under the names declared in
/// [`FunctionInfo`], run the program and return the declared outputs in
/// order. They differ only in the container type.
///
/// Calls take `&mut self`: one instance is never invoked from two threads
/// at once. Distinct instances, even over the same `FunctionInfo`, are
/// independent and may run concurrently.
pub trait BaseFunction: Send {
    fn call(&mut self, inputs: &[Tensor]) -> ForgeResult<Vec<Tensor>>;

    fn call_dense(&mut self, inputs: &[DenseTensor]) -> ForgeResult<Vec<DenseTensor>>;

    fn info(&self) -> &Arc<FunctionInfo>;
}
