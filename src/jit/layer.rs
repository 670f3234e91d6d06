//! A named collection of functions sharing one set of parameters.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::base::BaseFunction;
use super::function_utils::ParamMap;
use super::info::FunctionInfo;
use super::pe_function::PeFunction;
use crate::error::{ForgeResult, KernForgeError};
use crate::tensor::{Place, Tensor};

pub struct Layer {
    place: Place,
    functions: BTreeMap<String, Box<dyn BaseFunction>>,
}

impl Layer {
    pub fn new(place: Place) -> Self {
        Self {
            place,
            functions: BTreeMap::new(),
        }
    }

    /// One [`PeFunction`] per info, all sharing `params`.
    pub fn from_infos(
        infos: impl IntoIterator<Item = Arc<FunctionInfo>>,
        params: &ParamMap,
        place: Place,
    ) -> ForgeResult<Self> {
        let mut layer = Self::new(place);
        for info in infos {
            let name = info.name.clone();
            layer.add_function(name, Box::new(PeFunction::new(info, params, place)?));
        }
        Ok(layer)
    }

    pub fn add_function(&mut self, name: impl Into<String>, function: Box<dyn BaseFunction>) {
        self.functions.insert(name.into(), function);
    }

    pub fn function(&mut self, name: &str) -> Option<&mut (dyn BaseFunction + 'static)> {
        self.functions.get_mut(name).map(|f| f.as_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Sorted function names
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn call(&mut self, name: &str, inputs: &[Tensor]) -> ForgeResult<Vec<Tensor>> {
        self.function(name)
            .ok_or_else(|| KernForgeError::FunctionNotFound(name.to_string()))?
            .call(inputs)
    }

    /// Shorthand for the conventional entry point
    pub fn forward(&mut self, inputs: &[Tensor]) -> ForgeResult<Vec<Tensor>> {
        self.call("forward", inputs)
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("place", &self.place)
            .field("functions", &self.function_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{OpDesc, ProgramDesc};
    use crate::jit::{Argument, FunctionSchema};
    use crate::tensor::DenseTensor;

    fn info(name: &str, op: &str) -> Arc<FunctionInfo> {
        Arc::new(FunctionInfo::new(
            name,
            FunctionSchema::new()
                .with_input(Argument::new("x"))
                .with_output(Argument::new("y")),
            vec![],
            ProgramDesc::new().with_op(OpDesc::new(op).input("x").output("y")),
        ))
    }

    #[test]
    fn test_layer_dispatch_by_name() {
        let mut layer = Layer::from_infos(
            [info("forward", "amax"), info("minimum", "amin")],
            &ParamMap::new(),
            Place::cpu(),
        )
        .unwrap();
        assert_eq!(layer.function_names(), vec!["forward", "minimum"]);

        let x = Tensor::new(DenseTensor::from_vec(vec![3], vec![-5.0f64, 3.0, -2.0]).unwrap());
        let max = layer.forward(&[x.clone()]).unwrap();
        let min = layer.call("minimum", &[x]).unwrap();
        assert_eq!(max[0].to_vec::<f64>().unwrap(), vec![5.0]);
        assert_eq!(min[0].to_vec::<f64>().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_unknown_function() {
        let mut layer = Layer::new(Place::cpu());
        assert!(matches!(
            layer.call("forward", &[]),
            Err(KernForgeError::FunctionNotFound(_))
        ));
    }
}
