//! Dense tensors and the named tensor wrapper exposed to callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dtype::{DType, Element};
use super::place::Place;
use crate::error::{ForgeResult, KernForgeError};

/// Type-erased element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl TensorData {
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::F32 => TensorData::F32(Vec::new()),
            DType::F64 => TensorData::F64(Vec::new()),
            DType::I32 => TensorData::I32(Vec::new()),
            DType::I64 => TensorData::I64(Vec::new()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_f64_vec(&self) -> ForgeResult<Vec<f64>> {
        match self {
            TensorData::F32(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            TensorData::F64(v) => Ok(v.clone()),
            TensorData::I32(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            TensorData::I64(v) => v
                .iter()
                .map(|&x| {
                    if x.unsigned_abs() > MAX_EXACT_INT as u64 {
                        Err(KernForgeError::Serialization(format!(
                            "int64 value {} has no exact JSON literal",
                            x
                        )))
                    } else {
                        Ok(x as f64)
                    }
                })
                .collect(),
        }
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Dense row-major tensor with an explicit placement.
///
/// A freshly created output (`DenseTensor::empty`) has shape `[0]` and no
/// elements; kernels fill it through [`DenseTensor::set_data`]. A shape of
/// `[]` is a scalar holding one element.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    shape: Vec<usize>,
    place: Place,
    data: TensorData,
}

impl DenseTensor {
    /// Uninitialized output placeholder of the given element type.
    pub fn empty(dtype: DType, place: Place) -> Self {
        Self {
            shape: vec![0],
            place,
            data: TensorData::empty(dtype),
        }
    }

    pub fn from_vec<T: Element>(shape: Vec<usize>, data: Vec<T>) -> ForgeResult<Self> {
        Self::from_data(shape, T::wrap(data))
    }

    pub fn from_data(shape: Vec<usize>, data: TensorData) -> ForgeResult<Self> {
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(KernForgeError::InvalidShape(format!(
                "shape {:?} requires {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            place: Place::cpu(),
            data,
        })
    }

    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            shape: Vec::new(),
            place: Place::cpu(),
            data: T::wrap(vec![value]),
        }
    }

    /// Fill this tensor in place; used by kernels writing their output.
    pub fn set_data<T: Element>(&mut self, shape: Vec<usize>, data: Vec<T>) -> ForgeResult<()> {
        if T::DTYPE != self.dtype() {
            return Err(KernForgeError::DTypeMismatch {
                expected: self.dtype(),
                got: T::DTYPE,
            });
        }
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(KernForgeError::InvalidShape(format!(
                "shape {:?} requires {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        self.shape = shape;
        self.data = T::wrap(data);
        Ok(())
    }

    pub fn with_place(mut self, place: Place) -> Self {
        self.place = place;
        self
    }

    /// Copy onto another place. Storage is host memory for every backend,
    /// so this clones the buffer and re-tags the placement.
    pub fn to_place(&self, place: Place) -> Self {
        let mut copy = self.clone();
        copy.place = place;
        copy
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Borrow the elements as `T`, failing if the dtype differs.
    pub fn as_slice<T: Element>(&self) -> ForgeResult<&[T]> {
        T::slice(&self.data).ok_or(KernForgeError::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })
    }

    pub fn to_vec<T: Element>(&self) -> ForgeResult<Vec<T>> {
        self.as_slice::<T>().map(|s| s.to_vec())
    }
}

/// Named, cheaply clonable tensor handle.
///
/// This is the richer of the two containers a function accepts; it shares
/// the underlying [`DenseTensor`] and carries the variable name it was
/// produced under.
#[derive(Debug, Clone)]
pub struct Tensor {
    name: Option<String>,
    inner: Arc<DenseTensor>,
}

impl Tensor {
    pub fn new(dense: DenseTensor) -> Self {
        Self {
            name: None,
            inner: Arc::new(dense),
        }
    }

    pub fn from_shared(inner: Arc<DenseTensor>) -> Self {
        Self { name: None, inner }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn dense(&self) -> &DenseTensor {
        &self.inner
    }

    pub fn shared(&self) -> Arc<DenseTensor> {
        Arc::clone(&self.inner)
    }

    /// Take the dense tensor out, cloning only if other handles share it.
    pub fn into_dense(self) -> DenseTensor {
        Arc::try_unwrap(self.inner).unwrap_or_else(|shared| (*shared).clone())
    }

    pub fn shape(&self) -> &[usize] {
        self.inner.shape()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype()
    }

    pub fn to_vec<T: Element>(&self) -> ForgeResult<Vec<T>> {
        self.inner.to_vec()
    }
}

impl From<DenseTensor> for Tensor {
    fn from(dense: DenseTensor) -> Self {
        Tensor::new(dense)
    }
}

/// Largest integer magnitude a literal carries exactly (2^53 - 1).
pub const MAX_EXACT_INT: i64 = (1 << 53) - 1;

/// JSON form of a tensor, used by serialized inputs and the CLI.
///
/// Values are carried as `f64` and cast to `dtype` on conversion. Integer
/// tensors accept only whole numbers within `MAX_EXACT_INT`; anything
/// larger would not survive the `f64` round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorLiteral {
    #[serde(default)]
    pub name: Option<String>,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub data: Vec<f64>,
}

impl TensorLiteral {
    pub fn to_dense(&self, place: Place) -> ForgeResult<DenseTensor> {
        let data = match self.dtype {
            DType::F32 => TensorData::F32(cast_all(&self.data)?),
            DType::F64 => TensorData::F64(self.data.clone()),
            DType::I32 => TensorData::I32(cast_all(&self.data)?),
            DType::I64 => TensorData::I64(cast_all(&self.data)?),
        };
        Ok(DenseTensor::from_data(self.shape.clone(), data)?.with_place(place))
    }

    pub fn from_dense(name: Option<String>, dense: &DenseTensor) -> ForgeResult<Self> {
        Ok(Self {
            name,
            shape: dense.shape().to_vec(),
            dtype: dense.dtype(),
            data: dense.data().to_f64_vec()?,
        })
    }
}

fn cast_all<T: Element>(values: &[f64]) -> ForgeResult<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            let exact = T::DTYPE.is_float()
                || (v.fract() == 0.0 && v.abs() <= MAX_EXACT_INT as f64);
            num_traits::cast::<f64, T>(v).filter(|_| exact).ok_or_else(|| {
                KernForgeError::Serialization(format!(
                    "literal {} is not exactly representable as {}",
                    v,
                    T::DTYPE
                ))
            })
        })
        .collect()
}
