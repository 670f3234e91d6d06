//! Immutable execution graph compiled from a [`ProgramDesc`].
//!
//! Each node owns the kernels registered for its operator on the graph's
//! backend, one per element type, so running the graph never touches the
//! registry. The concrete instantiation is picked at run time from the
//! dtype of the node's first input.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::program::{OpDesc, ProgramDesc};
use crate::error::{ForgeResult, KernForgeError};
use crate::invalid_graph;
use crate::kernels::{Attributes, KernelEntry, KernelKey, KernelRegistry};
use crate::tensor::{Backend, DType, Place};

pub type NodeId = usize;

/// One operator in the graph together with its resolved kernels.
#[derive(Debug, Clone)]
pub struct GraphNode {
    id: NodeId,
    op: OpDesc,
    backend: Backend,
    kernels: BTreeMap<DType, KernelEntry>,
    dependencies: Vec<NodeId>,
    consumers: Vec<NodeId>,
}

impl GraphNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &OpDesc {
        &self.op
    }

    pub fn op_type(&self) -> &str {
        &self.op.op_type
    }

    pub fn inputs(&self) -> &[String] {
        &self.op.inputs
    }

    /// The single variable this node writes
    pub fn output(&self) -> &str {
        &self.op.outputs[0]
    }

    pub fn attrs(&self) -> &Attributes {
        &self.op.attrs
    }

    /// Nodes that must finish before this one starts
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn dep_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Nodes that read this node's output
    pub fn consumers(&self) -> &[NodeId] {
        &self.consumers
    }

    pub fn supported_dtypes(&self) -> impl Iterator<Item = DType> + '_ {
        self.kernels.keys().copied()
    }

    /// Kernel instantiation for `dtype`.
    pub fn kernel_for(&self, dtype: DType) -> ForgeResult<&KernelEntry> {
        self.kernels
            .get(&dtype)
            .ok_or_else(|| KernForgeError::KernelNotFound {
                key: KernelKey::new(self.op.op_type.as_str(), self.backend, self.op.layout, dtype)
                    .to_string(),
            })
    }
}

/// Compiled, read-only program bound to one place.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    place: Place,
    nodes: Vec<GraphNode>,
    topo_order: Vec<NodeId>,
    feeds: Vec<String>,
    params: Vec<String>,
}

impl ExecutionGraph {
    /// Compile `program` for `place`.
    ///
    /// Every input an operator reads must be fed, a parameter, or written by
    /// an earlier operator. Each operator writes exactly one variable and no
    /// variable is written twice.
    pub fn build(
        program: &ProgramDesc,
        feeds: &[String],
        params: &[String],
        place: Place,
        registry: &KernelRegistry,
    ) -> ForgeResult<Self> {
        place.validate()?;

        let mut external: HashSet<&str> = HashSet::with_capacity(feeds.len() + params.len());
        for name in feeds.iter().chain(params) {
            if !external.insert(name.as_str()) {
                return Err(invalid_graph!("variable '{}' is declared twice as an input", name));
            }
        }

        let mut producers: HashMap<&str, NodeId> = HashMap::with_capacity(program.len());
        let mut nodes: Vec<GraphNode> = Vec::with_capacity(program.len());

        for (id, op) in program.ops.iter().enumerate() {
            if op.outputs.len() != 1 {
                return Err(invalid_graph!(
                    "op #{} ({}) must write exactly one variable, writes {}",
                    id,
                    op.op_type,
                    op.outputs.len()
                ));
            }
            if op.inputs.is_empty() {
                return Err(invalid_graph!("op #{} ({}) has no inputs", id, op.op_type));
            }

            let mut dependencies = Vec::new();
            for input in &op.inputs {
                match producers.get(input.as_str()) {
                    Some(&producer) => {
                        if !dependencies.contains(&producer) {
                            dependencies.push(producer);
                        }
                    }
                    None if external.contains(input.as_str()) => {}
                    None => {
                        return Err(invalid_graph!(
                            "op #{} ({}) reads '{}', which has no producer and is not an input",
                            id,
                            op.op_type,
                            input
                        ))
                    }
                }
            }

            let output = op.outputs[0].as_str();
            if producers.contains_key(output) {
                return Err(invalid_graph!("variable '{}' has two producers", output));
            }
            if external.contains(output) {
                return Err(invalid_graph!(
                    "op #{} ({}) overwrites input variable '{}'",
                    id,
                    op.op_type,
                    output
                ));
            }

            let kernels = resolve_kernels(registry, op, place.backend)?;
            producers.insert(output, id);
            nodes.push(GraphNode {
                id,
                op: op.clone(),
                backend: place.backend,
                kernels,
                dependencies,
                consumers: Vec::new(),
            });
        }

        for id in 0..nodes.len() {
            for dep in nodes[id].dependencies.clone() {
                nodes[dep].consumers.push(id);
            }
        }

        let topo_order = topological_order(&nodes)?;
        tracing::debug!(nodes = nodes.len(), place = %place, "execution graph built");

        Ok(Self {
            place,
            nodes,
            topo_order,
            feeds: feeds.to_vec(),
            params: params.to_vec(),
        })
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Dependency-respecting order, ties broken by program order
    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    pub fn feeds(&self) -> &[String] {
        &self.feeds
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Variables written by the graph's nodes
    pub fn produced_vars(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(GraphNode::output)
    }

    /// Whether `name` exists after a successful run
    pub fn has_var(&self, name: &str) -> bool {
        self.feeds.iter().chain(&self.params).any(|n| n == name)
            || self.produced_vars().any(|n| n == name)
    }
}

fn resolve_kernels(
    registry: &KernelRegistry,
    op: &OpDesc,
    backend: Backend,
) -> ForgeResult<BTreeMap<DType, KernelEntry>> {
    let kernels: BTreeMap<DType, KernelEntry> = DType::ALL
        .iter()
        .filter_map(|&dtype| {
            let key = KernelKey::new(op.op_type.as_str(), backend, op.layout, dtype);
            registry.lookup(&key).ok().map(|entry| (dtype, entry))
        })
        .collect();

    if kernels.is_empty() {
        return Err(KernForgeError::KernelNotFound {
            key: format!("{}/{}/{}/*", op.op_type, backend, op.layout),
        });
    }
    Ok(kernels)
}

fn topological_order(nodes: &[GraphNode]) -> ForgeResult<Vec<NodeId>> {
    let mut remaining: Vec<usize> = nodes.iter().map(GraphNode::dep_count).collect();
    let mut ready: VecDeque<NodeId> = nodes
        .iter()
        .filter(|n| n.dep_count() == 0)
        .map(GraphNode::id)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = ready.pop_front() {
        order.push(id);
        for &consumer in &nodes[id].consumers {
            remaining[consumer] -= 1;
            if remaining[consumer] == 0 {
                ready.push_back(consumer);
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(invalid_graph!("program contains a dependency cycle"));
    }
    Ok(order)
}
