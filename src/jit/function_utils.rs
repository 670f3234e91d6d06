//! Helpers shared by the function implementations for moving tensors in
//! and out of a scope.

use std::collections::HashMap;
use std::sync::Arc;

use super::info::FunctionInfo;
use crate::error::{ForgeResult, KernForgeError};
use crate::executor::VariableScope;
use crate::internal_error;
use crate::tensor::{DenseTensor, Tensor};

/// Parameters by name, shared across every function that uses them
pub type ParamMap = HashMap<String, Arc<DenseTensor>>;

/// Bind each declared parameter into `scope`.
pub fn share_params_into_scope(
    names: &[String],
    params: &ParamMap,
    scope: &mut VariableScope,
) -> ForgeResult<()> {
    for name in names {
        let tensor = params
            .get(name)
            .ok_or_else(|| KernForgeError::VariableNotFound(format!("parameter '{}'", name)))?;
        scope.set_var(name.clone(), Arc::clone(tensor));
    }
    Ok(())
}

/// Bind `tensors` positionally under `names`.
pub fn share_into_scope(
    names: &[String],
    tensors: Vec<Arc<DenseTensor>>,
    scope: &mut VariableScope,
) -> ForgeResult<()> {
    if names.len() != tensors.len() {
        return Err(internal_error!(
            "{} names for {} tensors",
            names.len(),
            tensors.len()
        ));
    }
    for (name, tensor) in names.iter().zip(tensors) {
        scope.set_var(name.clone(), tensor);
    }
    Ok(())
}

/// Read the named variables out of `scope` in order.
pub fn fetch_outputs(
    names: &[String],
    scope: &VariableScope,
) -> ForgeResult<Vec<Arc<DenseTensor>>> {
    names.iter().map(|name| scope.get(name)).collect()
}

/// Reject calls whose input count or element types disagree with the
/// function's signature.
pub fn check_inputs(info: &FunctionInfo, inputs: &[Arc<DenseTensor>]) -> ForgeResult<()> {
    if inputs.len() != info.num_inputs() {
        return Err(KernForgeError::ArityMismatch {
            function: info.name.clone(),
            expected: info.num_inputs(),
            got: inputs.len(),
        });
    }
    for (arg, tensor) in info.schema.inputs.iter().zip(inputs) {
        if let Some(expected) = arg.dtype {
            if tensor.dtype() != expected {
                return Err(KernForgeError::DTypeMismatch {
                    expected,
                    got: tensor.dtype(),
                });
            }
        }
    }
    Ok(())
}

/// Wrap fetched outputs as named tensors
pub fn to_named_tensors(names: &[String], outputs: Vec<Arc<DenseTensor>>) -> Vec<Tensor> {
    names
        .iter()
        .zip(outputs)
        .map(|(name, t)| Tensor::from_shared(t).with_name(name.clone()))
        .collect()
}
