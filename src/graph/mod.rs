//! Program description and the execution graph compiled from it

pub mod execution_graph;
pub mod program;

pub use crate::kernels::{AttrValue, Attributes};
pub use execution_graph::{ExecutionGraph, GraphNode, NodeId};
pub use program::{OpDesc, ProgramDesc};
