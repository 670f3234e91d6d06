//! Element types supported by kernels.

use std::fmt;

use num_traits::{Bounded, Num, NumCast};
use serde::{Deserialize, Serialize};

use super::dense::TensorData;

/// Runtime tag for the scalar type stored in a tensor.
///
/// Kernels are registered per `DType`; the executor reads the tag from a
/// node's first input to pick the instantiation to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    pub const ALL: [DType; 4] = [DType::F32, DType::F64, DType::I32, DType::I64];

    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Parse the names used in serialized programs ("float32", "f32", "int64", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "f32" | "float32" | "float" => Some(DType::F32),
            "f64" | "float64" | "double" => Some(DType::F64),
            "i32" | "int32" | "int" => Some(DType::I32),
            "i64" | "int64" => Some(DType::I64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
        };
        write!(f, "{}", s)
    }
}

/// Rust scalar types a generic kernel body can be instantiated for.
///
/// This is the capability set a kernel may rely on: arithmetic (`Num`),
/// ordering (`PartialOrd`), bounds and lossy numeric casts. Each
/// implementor also knows how to move a typed buffer in and out of the
/// type-erased [`TensorData`].
pub trait Element:
    Copy + PartialOrd + Num + Bounded + NumCast + Send + Sync + fmt::Debug + 'static
{
    const DTYPE: DType;

    /// Absolute value. Saturates for the signed integer minimum.
    fn abs_value(self) -> Self;

    /// Sum, or `None` when an integer sum overflows.
    fn checked_sum(self, rhs: Self) -> Option<Self>;

    fn wrap(data: Vec<Self>) -> TensorData;

    fn slice(data: &TensorData) -> Option<&[Self]>;
}

macro_rules! impl_float_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn abs_value(self) -> Self {
                self.abs()
            }

            fn checked_sum(self, rhs: Self) -> Option<Self> {
                Some(self + rhs)
            }

            fn wrap(data: Vec<Self>) -> TensorData {
                TensorData::$variant(data)
            }

            fn slice(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! impl_int_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn abs_value(self) -> Self {
                self.saturating_abs()
            }

            fn checked_sum(self, rhs: Self) -> Option<Self> {
                self.checked_add(rhs)
            }

            fn wrap(data: Vec<Self>) -> TensorData {
                TensorData::$variant(data)
            }

            fn slice(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_float_element!(f32, F32);
impl_float_element!(f64, F64);
impl_int_element!(i32, I32);
impl_int_element!(i64, I64);
