//! Reductions over a subset of axes
//!
//! All reductions share [`ReducePlan`], which normalizes the requested axes
//! and derives the output shape, and [`reduce_with`], which folds every
//! input element into its output slot.
//!
//! Each reduction comes in two layers:
//! - a raw primitive taking an explicit `reduce_all` flag
//! - a public adapter that always passes `reduce_all = false` and lets the
//!   plan decide whether every axis is reduced

pub mod amax;
pub mod amin;

pub use amax::{amax_entry, amax_kernel, amax_raw_entry, amax_raw_kernel};
pub use amin::{amin_entry, amin_kernel, amin_raw_entry, amin_raw_kernel};

use crate::error::{ForgeResult, KernForgeError};
use crate::tensor::Element;

/// Normalized description of one reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducePlan {
    /// Sorted, deduplicated, non-negative axes
    pub axes: Vec<usize>,
    pub reduce_all: bool,
    pub keep_dim: bool,
    pub out_shape: Vec<usize>,
}

impl ReducePlan {
    /// Validate `dims` against `shape` and compute the output shape.
    ///
    /// Negative dims count from the back. `reduce_all` is forced on when
    /// `dims` is empty or names every axis. A rank-0 input accepts `0` and
    /// `-1`.
    pub fn new(
        shape: &[usize],
        dims: &[i64],
        keep_dim: bool,
        reduce_all: bool,
    ) -> ForgeResult<Self> {
        let rank = shape.len();
        // Scalars behave like rank 1 for dim normalization
        let check_rank = rank.max(1) as i64;

        let mut axes = Vec::with_capacity(dims.len());
        for &dim in dims {
            let normalized = if dim < 0 { dim + check_rank } else { dim };
            if normalized < 0 || normalized >= check_rank {
                return Err(KernForgeError::DimOutOfRange { dim, rank });
            }
            let axis = normalized as usize;
            if axes.contains(&axis) {
                return Err(KernForgeError::InvalidAttribute(format!(
                    "reduction axis {} given more than once in {:?}",
                    axis, dims
                )));
            }
            axes.push(axis);
        }
        axes.sort_unstable();
        if rank == 0 {
            axes.clear();
        }

        let reduce_all = reduce_all || axes.is_empty() || axes.len() == rank;
        let axes: Vec<usize> = if reduce_all { (0..rank).collect() } else { axes };

        let out_shape = shape
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| {
                if !axes.contains(&i) {
                    Some(d)
                } else if keep_dim {
                    Some(1)
                } else {
                    None
                }
            })
            .collect();

        Ok(Self {
            axes,
            reduce_all,
            keep_dim,
            out_shape,
        })
    }

    pub fn is_reduced(&self, axis: usize) -> bool {
        self.axes.binary_search(&axis).is_ok()
    }

    pub fn out_numel(&self) -> usize {
        self.out_shape.iter().product()
    }
}

/// Fold `map(x)` over the reduced axes of a row-major buffer.
///
/// Every output slot receives at least one element unless the input is
/// empty, which is rejected when the output is not.
pub fn reduce_with<T, M, F>(
    data: &[T],
    shape: &[usize],
    plan: &ReducePlan,
    map: M,
    fold: F,
) -> ForgeResult<Vec<T>>
where
    T: Element,
    M: Fn(T) -> T,
    F: Fn(T, T) -> T,
{
    let rank = shape.len();

    // Stride of each input axis inside the output buffer (0 when reduced)
    let mut out_strides = vec![0usize; rank];
    let mut out_len = 1usize;
    for axis in (0..rank).rev() {
        if !plan.is_reduced(axis) {
            out_strides[axis] = out_len;
            out_len *= shape[axis];
        }
    }

    if data.is_empty() {
        if out_len == 0 {
            return Ok(Vec::new());
        }
        return Err(KernForgeError::InvalidShape(format!(
            "cannot reduce empty tensor of shape {:?}",
            shape
        )));
    }

    let mut acc: Vec<Option<T>> = vec![None; out_len];
    let mut index = vec![0usize; rank];
    for &value in data {
        let slot: usize = index
            .iter()
            .zip(&out_strides)
            .map(|(i, stride)| i * stride)
            .sum();
        let mapped = map(value);
        acc[slot] = Some(match acc[slot] {
            Some(current) => fold(current, mapped),
            None => mapped,
        });

        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }

    acc.into_iter()
        .map(|slot| {
            slot.ok_or_else(|| crate::internal_error!("reduction left an output slot empty"))
        })
        .collect()
}
