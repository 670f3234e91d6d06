//! Serializable program description: an ordered list of operators over
//! named variables.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::kernels::{AttrValue, Attributes};
use crate::tensor::DataLayout;

/// One operator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub attrs: Attributes,
    /// Layout the inputs arrive in; `All` accepts any registered kernel
    #[serde(default)]
    pub layout: DataLayout,
}

impl OpDesc {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: Attributes::new(),
            layout: DataLayout::All,
        }
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Operators in program order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDesc {
    pub ops: Vec<OpDesc>,
}

impl ProgramDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_op(mut self, op: OpDesc) -> Self {
        self.ops.push(op);
        self
    }

    pub fn push_op(&mut self, op: OpDesc) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Every variable written by some operator
    pub fn produced_vars(&self) -> BTreeSet<&str> {
        self.ops
            .iter()
            .flat_map(|op| op.outputs.iter().map(String::as_str))
            .collect()
    }
}
