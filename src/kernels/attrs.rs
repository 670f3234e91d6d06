//! Operator attributes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeResult, KernForgeError};

/// A single attribute value.
///
/// Serialized untagged, so `true`, `2`, `0.5`, `[1, 2]` and `"x"` map
/// directly onto the variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Ints(Vec<i64>),
    Str(String),
}

impl AttrValue {
    fn kind(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Ints(_) => "ints",
            AttrValue::Str(_) => "string",
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::Ints(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

/// Named attributes of one operator, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    pub fn bool_or(&self, name: &str, default: bool) -> ForgeResult<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(AttrValue::Bool(v)) => Ok(*v),
            Some(other) => Err(wrong_kind(name, "bool", other)),
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> ForgeResult<i64> {
        match self.get(name) {
            None => Ok(default),
            Some(AttrValue::Int(v)) => Ok(*v),
            Some(other) => Err(wrong_kind(name, "int", other)),
        }
    }

    /// Integers are accepted where a float is expected.
    pub fn float_or(&self, name: &str, default: f64) -> ForgeResult<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(AttrValue::Float(v)) => Ok(*v),
            Some(AttrValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(wrong_kind(name, "float", other)),
        }
    }

    /// A single `Int` is accepted as a one-element list.
    pub fn ints_or(&self, name: &str, default: &[i64]) -> ForgeResult<Vec<i64>> {
        match self.get(name) {
            None => Ok(default.to_vec()),
            Some(AttrValue::Ints(v)) => Ok(v.clone()),
            Some(AttrValue::Int(v)) => Ok(vec![*v]),
            Some(other) => Err(wrong_kind(name, "ints", other)),
        }
    }

    pub fn str(&self, name: &str) -> ForgeResult<&str> {
        match self.get(name) {
            Some(AttrValue::Str(v)) => Ok(v),
            Some(other) => Err(wrong_kind(name, "string", other)),
            None => Err(KernForgeError::InvalidAttribute(format!(
                "missing attribute '{}'",
                name
            ))),
        }
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}

fn wrong_kind(name: &str, expected: &str, got: &AttrValue) -> KernForgeError {
    KernForgeError::InvalidAttribute(format!(
        "attribute '{}' must be {}, got {}",
        name,
        expected,
        got.kind()
    ))
}
