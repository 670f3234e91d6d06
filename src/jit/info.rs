//! Function metadata: signature, parameter names and program

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ForgeResult;
use crate::graph::ProgramDesc;
use crate::tensor::DType;

/// One positional input or output of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// Element type the caller must pass; `None` accepts any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
        }
    }

    pub fn typed(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype: Some(dtype),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
}

impl FunctionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, arg: Argument) -> Self {
        self.inputs.push(arg);
        self
    }

    pub fn with_output(mut self, arg: Argument) -> Self {
        self.outputs.push(arg);
        self
    }
}

/// Everything needed to instantiate a callable function.
///
/// Shared read-only as `Arc<FunctionInfo>` by every function built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub schema: FunctionSchema,
    #[serde(default)]
    pub param_names: Vec<String>,
    pub program: ProgramDesc,
}

impl FunctionInfo {
    pub fn new(
        name: impl Into<String>,
        schema: FunctionSchema,
        param_names: Vec<String>,
        program: ProgramDesc,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            param_names,
            program,
        }
    }

    pub fn input_arg_names(&self) -> Vec<String> {
        self.schema.inputs.iter().map(|a| a.name.clone()).collect()
    }

    pub fn output_arg_names(&self) -> Vec<String> {
        self.schema.outputs.iter().map(|a| a.name.clone()).collect()
    }

    pub fn num_inputs(&self) -> usize {
        self.schema.inputs.len()
    }

    pub fn from_json(json: &str) -> ForgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ForgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ForgeResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
