//! Named variable bindings used while running a graph.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ForgeResult, KernForgeError};
use crate::tensor::DenseTensor;

/// Map from variable name to tensor.
///
/// Tensors are shared: binding a parameter into many scopes does not copy
/// it. A scope has no internal locking; whoever holds `&mut` owns it.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    vars: HashMap<String, Arc<DenseTensor>>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn set_var(&mut self, name: impl Into<String>, tensor: Arc<DenseTensor>) {
        self.vars.insert(name.into(), tensor);
    }

    pub fn find_var(&self, name: &str) -> Option<&Arc<DenseTensor>> {
        self.vars.get(name)
    }

    pub fn get(&self, name: &str) -> ForgeResult<Arc<DenseTensor>> {
        self.find_var(name)
            .cloned()
            .ok_or_else(|| KernForgeError::VariableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Remove the named bindings, returning how many existed
    pub fn drop_vars<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        names
            .into_iter()
            .filter(|name| self.vars.remove(*name).is_some())
            .count()
    }

    /// Sorted variable names
    pub fn var_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(v: f32) -> Arc<DenseTensor> {
        Arc::new(DenseTensor::scalar(v))
    }

    #[test]
    fn test_set_find_get() {
        let mut scope = VariableScope::new();
        scope.set_var("x", tensor(1.0));
        assert!(scope.contains("x"));
        assert_eq!(scope.get("x").unwrap().to_vec::<f32>().unwrap(), vec![1.0]);
        assert!(scope.find_var("y").is_none());
        assert!(matches!(scope.get("y"), Err(KernForgeError::VariableNotFound(_))));
    }

    #[test]
    fn test_rebinding_replaces() {
        let mut scope = VariableScope::new();
        scope.set_var("x", tensor(1.0));
        scope.set_var("x", tensor(2.0));
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.get("x").unwrap().to_vec::<f32>().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_drop_vars() {
        let mut scope = VariableScope::new();
        scope.set_var("a", tensor(1.0));
        scope.set_var("b", tensor(2.0));
        scope.set_var("c", tensor(3.0));
        assert_eq!(scope.drop_vars(["a", "c", "missing"]), 2);
        assert_eq!(scope.var_names(), vec!["b"]);
    }
}
