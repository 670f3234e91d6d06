//! Function that compiles eagerly and runs nodes on the calling thread.

use std::sync::Arc;

use super::base::BaseFunction;
use super::function_utils::ParamMap;
use super::info::FunctionInfo;
use super::pe_function::PeFunction;
use crate::error::ForgeResult;
use crate::executor::ExecutionStrategy;
use crate::kernels::KernelRegistry;
use crate::tensor::{DenseTensor, Place, Tensor};

/// Same calling contract as [`PeFunction`], but the graph is built during
/// construction (so program errors surface there) and execution is
/// sequential. Useful where spawning a worker pool per function is too
/// costly.
#[derive(Debug)]
pub struct ExecutorFunction {
    inner: PeFunction,
}

impl ExecutorFunction {
    pub fn new(info: Arc<FunctionInfo>, params: &ParamMap, place: Place) -> ForgeResult<Self> {
        let inner = PeFunction::new(info, params, place)?;
        Self::from_pe(inner)
    }

    pub fn with_registry(
        info: Arc<FunctionInfo>,
        params: &ParamMap,
        place: Place,
        registry: &'static KernelRegistry,
    ) -> ForgeResult<Self> {
        let inner = PeFunction::new(info, params, place)?.with_registry(registry);
        Self::from_pe(inner)
    }

    fn from_pe(inner: PeFunction) -> ForgeResult<Self> {
        let mut inner = inner.with_strategy(ExecutionStrategy::sequential());
        inner.ensure_ready()?;
        Ok(Self { inner })
    }

    pub fn place(&self) -> Place {
        self.inner.place()
    }
}

impl BaseFunction for ExecutorFunction {
    fn call(&mut self, inputs: &[Tensor]) -> ForgeResult<Vec<Tensor>> {
        self.inner.call(inputs)
    }

    fn call_dense(&mut self, inputs: &[DenseTensor]) -> ForgeResult<Vec<DenseTensor>> {
        self.inner.call_dense(inputs)
    }

    fn info(&self) -> &Arc<FunctionInfo> {
        self.inner.info()
    }
}
