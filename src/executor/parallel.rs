//! Dependency-counting graph executor backed by a rayon pool.
//!
//! The calling thread acts as coordinator: it keeps the ready queue and the
//! per-node remaining-dependency counts, hands ready nodes to the pool, and
//! receives their results over a channel. Outputs are staged in a run-local
//! map and committed to the scope only when every node succeeded, so a
//! failed run leaves the scope exactly as it was.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::config::ExecutionStrategy;
use super::scope::VariableScope;
use crate::error::{ForgeResult, KernForgeError};
use crate::graph::{ExecutionGraph, GraphNode, NodeId};
use crate::internal_error;
use crate::kernels::KernelArgs;
use crate::tensor::{DenseTensor, DeviceContext, Place};

/// Lifecycle of an executor. A fresh executor is `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Ready,
    Running,
    /// Last run failed; the executor may run again
    Failed,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorState::Ready => write!(f, "ready"),
            ExecutorState::Running => write!(f, "running"),
            ExecutorState::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub nodes_executed: usize,
    /// Most nodes in flight at the same time
    pub peak_parallelism: usize,
    pub elapsed: Duration,
}

type Staged = HashMap<String, Arc<DenseTensor>>;

/// Pool shared by every executor whose strategy leaves `num_threads` at 0.
static SHARED_POOL: Lazy<Result<Arc<ThreadPool>, String>> =
    Lazy::new(|| build_pool(0).map_err(|e| e.to_string()));

fn build_pool(num_threads: usize) -> ForgeResult<Arc<ThreadPool>> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("kernforge-exec-{}", i))
        .build()
        .map(Arc::new)
        .map_err(|e| internal_error!("failed to start executor pool: {}", e))
}

/// Runs an [`ExecutionGraph`] against a [`VariableScope`].
pub struct ParallelExecutor {
    graph: Arc<ExecutionGraph>,
    strategy: ExecutionStrategy,
    ctx: DeviceContext,
    pool: Option<Arc<ThreadPool>>,
    state: ExecutorState,
    run_count: usize,
}

impl ParallelExecutor {
    /// Bind `graph` to `place`, which must be the place it was built for.
    ///
    /// With `num_threads == 0` the executor uses the process-wide pool;
    /// an explicit thread count gets a dedicated pool.
    pub fn new(
        graph: Arc<ExecutionGraph>,
        strategy: ExecutionStrategy,
        place: Place,
    ) -> ForgeResult<Self> {
        place.validate()?;
        if graph.place() != place {
            return Err(KernForgeError::InvalidPlace(format!(
                "graph was built for {}, executor asked to run on {}",
                graph.place(),
                place
            )));
        }

        let pool = match (strategy.allow_parallel, strategy.num_threads) {
            (false, _) => None,
            (true, 0) => Some(
                SHARED_POOL
                    .as_ref()
                    .map(Arc::clone)
                    .map_err(|e| internal_error!("{}", e))?,
            ),
            (true, n) => Some(build_pool(n)?),
        };

        tracing::debug!(
            nodes = graph.num_nodes(),
            place = %place,
            parallel = strategy.allow_parallel,
            threads = pool.as_ref().map(|p| p.current_num_threads()).unwrap_or(1),
            "executor created"
        );

        Ok(Self {
            graph,
            strategy,
            ctx: DeviceContext::new(place),
            pool,
            state: ExecutorState::Ready,
            run_count: 0,
        })
    }

    pub fn graph(&self) -> &Arc<ExecutionGraph> {
        &self.graph
    }

    pub fn strategy(&self) -> &ExecutionStrategy {
        &self.strategy
    }

    pub fn place(&self) -> Place {
        self.ctx.place()
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Number of successful runs
    pub fn run_count(&self) -> usize {
        self.run_count
    }

    /// Execute every node once.
    ///
    /// On success all produced variables are bound in `scope`. On failure
    /// the first error is returned, no further nodes are dispatched, nodes
    /// already in flight are awaited, and `scope` is left untouched.
    pub fn run(&mut self, scope: &mut VariableScope) -> ForgeResult<RunStats> {
        let _span =
            tracing::debug_span!("graph_run", run = self.run_count, place = %self.ctx.place())
                .entered();
        self.state = ExecutorState::Running;
        let start = Instant::now();

        let outcome = match &self.pool {
            Some(pool) => run_parallel(pool, &self.graph, &self.ctx, scope),
            None => run_sequential(&self.graph, &self.ctx, scope),
        };

        match outcome {
            Ok((staged, peak_parallelism)) => {
                let nodes_executed = staged.len();
                for (name, tensor) in staged {
                    scope.set_var(name, tensor);
                }
                self.state = ExecutorState::Ready;
                self.run_count += 1;
                let stats = RunStats {
                    nodes_executed,
                    peak_parallelism,
                    elapsed: start.elapsed(),
                };
                tracing::debug!(
                    nodes = stats.nodes_executed,
                    peak = stats.peak_parallelism,
                    elapsed_us = stats.elapsed.as_micros() as u64,
                    "graph run finished"
                );
                Ok(stats)
            }
            Err(e) => {
                self.state = ExecutorState::Failed;
                tracing::warn!(error = %e, "graph run failed");
                Err(e)
            }
        }
    }

    /// Drop the graph's intermediate variables from `scope` when the
    /// configured number of runs has elapsed. Returns how many were removed.
    pub fn drop_local_vars_if_due(&self, scope: &mut VariableScope) -> usize {
        let interval = self.strategy.num_iteration_per_drop_scope;
        if interval == 0 || self.run_count == 0 || self.run_count % interval != 0 {
            return 0;
        }
        scope.drop_vars(self.graph.produced_vars())
    }
}

impl fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("nodes", &self.graph.num_nodes())
            .field("place", &self.ctx.place())
            .field("strategy", &self.strategy)
            .field("state", &self.state)
            .field("run_count", &self.run_count)
            .finish()
    }
}

fn gather_inputs(
    node: &GraphNode,
    staged: &Staged,
    scope: &VariableScope,
) -> ForgeResult<Vec<Arc<DenseTensor>>> {
    node.inputs()
        .iter()
        .map(|name| match staged.get(name) {
            Some(tensor) => Ok(Arc::clone(tensor)),
            None => scope.get(name),
        })
        .collect()
}

/// Run one node's kernel. Kernel failures other than a missing
/// instantiation are reported as `Execution` errors naming the node.
fn execute_node(
    node: &GraphNode,
    ctx: &DeviceContext,
    inputs: &[Arc<DenseTensor>],
) -> ForgeResult<DenseTensor> {
    let dtype = inputs
        .first()
        .map(|t| t.dtype())
        .ok_or_else(|| internal_error!("node {} has no inputs", node.id()))?;
    let entry = node.kernel_for(dtype)?;

    let out_dtype = entry.args_def.output_dtype.unwrap_or(dtype);
    let mut out = DenseTensor::empty(out_dtype, ctx.place());
    let refs: Vec<&DenseTensor> = inputs.iter().map(|t| t.as_ref()).collect();
    let args = KernelArgs::new(&refs, node.attrs());

    tracing::debug!(node = node.id(), op = node.op_type(), dtype = %dtype, "dispatch");
    (entry.func)(ctx, &args, &mut out).map_err(|e| match e {
        KernForgeError::KernelNotFound { .. } => e,
        other => KernForgeError::Execution {
            op: node.op_type().to_string(),
            node: node.id(),
            message: other.to_string(),
        },
    })?;
    Ok(out)
}

/// [`execute_node`] with kernel panics reported as `Execution` errors.
fn execute_node_guarded(
    node: &GraphNode,
    ctx: &DeviceContext,
    inputs: &[Arc<DenseTensor>],
) -> ForgeResult<DenseTensor> {
    panic::catch_unwind(AssertUnwindSafe(|| execute_node(node, ctx, inputs))).unwrap_or_else(|_| {
        tracing::error!(node = node.id(), op = node.op_type(), "kernel panicked");
        Err(KernForgeError::Execution {
            op: node.op_type().to_string(),
            node: node.id(),
            message: "kernel panicked".to_string(),
        })
    })
}

fn run_sequential(
    graph: &ExecutionGraph,
    ctx: &DeviceContext,
    scope: &VariableScope,
) -> ForgeResult<(Staged, usize)> {
    let mut staged = Staged::with_capacity(graph.num_nodes());
    for &id in graph.topo_order() {
        let node = graph
            .node(id)
            .ok_or_else(|| internal_error!("topological order names unknown node {}", id))?;
        let inputs = gather_inputs(node, &staged, scope)?;
        let out = execute_node_guarded(node, ctx, &inputs)?;
        staged.insert(node.output().to_string(), Arc::new(out));
    }
    let peak = usize::from(graph.num_nodes() > 0);
    Ok((staged, peak))
}

fn run_parallel(
    pool: &ThreadPool,
    graph: &Arc<ExecutionGraph>,
    ctx: &DeviceContext,
    scope: &VariableScope,
) -> ForgeResult<(Staged, usize)> {
    let nodes = graph.nodes();
    let mut remaining: Vec<usize> = nodes.iter().map(GraphNode::dep_count).collect();
    let mut ready: VecDeque<NodeId> = graph
        .topo_order()
        .iter()
        .copied()
        .filter(|&id| remaining[id] == 0)
        .collect();

    let (tx, rx) = mpsc::channel::<(NodeId, ForgeResult<DenseTensor>)>();
    let mut staged = Staged::with_capacity(nodes.len());
    let mut failure: Option<KernForgeError> = None;
    let mut in_flight = 0usize;
    let mut peak = 0usize;

    loop {
        while failure.is_none() {
            let Some(id) = ready.pop_front() else { break };
            let inputs = match gather_inputs(&nodes[id], &staged, scope) {
                Ok(inputs) => inputs,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };

            let graph = Arc::clone(graph);
            let ctx = ctx.clone();
            let tx = tx.clone();
            pool.spawn(move || {
                let result = execute_node_guarded(&graph.nodes()[id], &ctx, &inputs);
                // The coordinator outlives every job it spawned
                let _ = tx.send((id, result));
            });
            in_flight += 1;
            peak = peak.max(in_flight);
        }

        if in_flight == 0 {
            break;
        }

        let (id, result) = rx
            .recv()
            .map_err(|_| internal_error!("executor completion channel closed"))?;
        in_flight -= 1;

        match result {
            Ok(out) if failure.is_none() => {
                staged.insert(nodes[id].output().to_string(), Arc::new(out));
                for &consumer in nodes[id].consumers() {
                    remaining[consumer] -= 1;
                    if remaining[consumer] == 0 {
                        ready.push_back(consumer);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }
    if staged.len() != nodes.len() {
        return Err(internal_error!(
            "executed {} of {} nodes",
            staged.len(),
            nodes.len()
        ));
    }
    Ok((staged, peak))
}
