//! Function backed by a lazily created parallel executor.

use std::sync::Arc;

use once_cell::unsync::OnceCell;

use super::base::BaseFunction;
use super::function_utils::{
    check_inputs, fetch_outputs, share_into_scope, share_params_into_scope, to_named_tensors,
    ParamMap,
};
use super::info::FunctionInfo;
use crate::error::ForgeResult;
use crate::executor::{ExecutionStrategy, ParallelExecutor, VariableScope};
use crate::graph::ExecutionGraph;
use crate::kernels::{global_registry, KernelRegistry};
use crate::tensor::{DenseTensor, Place, Tensor};

/// Callable function over an [`ExecutionGraph`] run by a [`ParallelExecutor`].
///
/// Construction only validates the place and binds the parameters; the
/// graph and executor are built on the first call (or an explicit
/// [`ensure_ready`](PeFunction::ensure_ready)) and reused afterwards.
///
/// Concurrency: an instance owns a single variable scope with no internal
/// locking, so calls take `&mut self`. To call one function from several
/// threads, wrap it in a `Mutex` or build one instance per thread.
pub struct PeFunction {
    info: Arc<FunctionInfo>,
    place: Place,
    strategy: ExecutionStrategy,
    registry: &'static KernelRegistry,
    scope: VariableScope,
    executor: OnceCell<ParallelExecutor>,
    graph_builds: usize,
}

impl PeFunction {
    /// Fails with `InvalidPlace` if `place` is unusable in this build and
    /// with `VariableNotFound` if a declared parameter is missing.
    pub fn new(info: Arc<FunctionInfo>, params: &ParamMap, place: Place) -> ForgeResult<Self> {
        place.validate()?;

        let mut scope = VariableScope::new();
        share_params_into_scope(&info.param_names, params, &mut scope)?;
        for name in &info.param_names {
            if let Some(param) = scope.find_var(name) {
                if param.place() != place {
                    let moved = Arc::new(param.to_place(place));
                    scope.set_var(name.clone(), moved);
                }
            }
        }

        Ok(Self {
            info,
            place,
            strategy: ExecutionStrategy::default(),
            registry: global_registry(),
            scope,
            executor: OnceCell::new(),
            graph_builds: 0,
        })
    }

    /// Use a different strategy. Has no effect once the executor exists.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Resolve kernels from `registry` instead of the global one. Has no
    /// effect once the executor exists.
    pub fn with_registry(mut self, registry: &'static KernelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the graph and executor if that has not happened yet.
    pub fn ensure_ready(&mut self) -> ForgeResult<()> {
        let info = &self.info;
        let place = self.place;
        let strategy = &self.strategy;
        let registry = self.registry;
        let builds = &mut self.graph_builds;

        self.executor.get_or_try_init(|| {
            *builds += 1;
            tracing::debug!(function = %info.name, place = %place, "building graph and executor");
            let graph = ExecutionGraph::build(
                &info.program,
                &info.input_arg_names(),
                &info.param_names,
                place,
                registry,
            )?;
            for name in info.output_arg_names() {
                if !graph.has_var(&name) {
                    return Err(crate::invalid_graph!(
                        "function '{}' declares output '{}' which the program never produces",
                        info.name,
                        name
                    ));
                }
            }
            ParallelExecutor::new(Arc::new(graph), strategy.clone(), place)
        })?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.executor.get().is_some()
    }

    /// How many times a graph was compiled for this instance
    pub fn graph_builds(&self) -> usize {
        self.graph_builds
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn executor(&self) -> Option<&ParallelExecutor> {
        self.executor.get()
    }

    pub fn scope(&self) -> &VariableScope {
        &self.scope
    }

    fn run_shared(&mut self, inputs: Vec<Arc<DenseTensor>>) -> ForgeResult<Vec<Arc<DenseTensor>>> {
        check_inputs(&self.info, &inputs)?;
        self.ensure_ready()?;

        let place = self.place;
        let inputs: Vec<Arc<DenseTensor>> = inputs
            .into_iter()
            .map(|t| {
                if t.place() == place {
                    t
                } else {
                    Arc::new(t.to_place(place))
                }
            })
            .collect();

        let input_names = self.info.input_arg_names();
        share_into_scope(&input_names, inputs, &mut self.scope)?;

        let executor = self
            .executor
            .get_mut()
            .ok_or_else(|| crate::internal_error!("executor missing after initialization"))?;
        if let Err(e) = executor.run(&mut self.scope) {
            self.scope.drop_vars(input_names.iter().map(String::as_str));
            return Err(e);
        }

        let outputs = fetch_outputs(&self.info.output_arg_names(), &self.scope)?;
        executor.drop_local_vars_if_due(&mut self.scope);
        Ok(outputs)
    }
}

impl BaseFunction for PeFunction {
    fn call(&mut self, inputs: &[Tensor]) -> ForgeResult<Vec<Tensor>> {
        let shared = inputs.iter().map(Tensor::shared).collect();
        let outputs = self.run_shared(shared)?;
        Ok(to_named_tensors(&self.info.output_arg_names(), outputs))
    }

    fn call_dense(&mut self, inputs: &[DenseTensor]) -> ForgeResult<Vec<DenseTensor>> {
        let shared = inputs.iter().cloned().map(Arc::new).collect();
        let outputs = self.run_shared(shared)?;
        Ok(outputs
            .into_iter()
            .map(|t| Tensor::from_shared(t).into_dense())
            .collect())
    }

    fn info(&self) -> &Arc<FunctionInfo> {
        &self.info
    }
}

impl std::fmt::Debug for PeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeFunction")
            .field("name", &self.info.name)
            .field("place", &self.place)
            .field("ready", &self.is_ready())
            .field("graph_builds", &self.graph_builds)
            .finish()
    }
}
