//! Reduction Property Tests
//!
//! Property-based checks for the amax/amin reductions:
//! - amax equals the largest absolute value, amin the smallest
//! - keep_dim turns reduced axes into 1s, otherwise drops them
//! - the adapter never differs from the raw primitive with reduce_all off
//! - listing every axis is the same as listing none
//!
//! Run with: cargo test --test amax_properties

mod common;

use common::fixtures::dense;
use kernforge::kernels::reduce::{amax_kernel, amax_raw_kernel, amin_kernel, ReducePlan};
use kernforge::tensor::{DType, DenseTensor, DeviceContext, Place};
use proptest::prelude::*;

fn ctx() -> DeviceContext {
    DeviceContext::new(Place::cpu())
}

fn amax(x: &DenseTensor, dims: &[i64], keep_dim: bool) -> DenseTensor {
    let mut out = DenseTensor::empty(x.dtype(), Place::cpu());
    match x.dtype() {
        DType::F32 => amax_kernel::<f32>(&ctx(), x, dims, keep_dim, &mut out),
        DType::I64 => amax_kernel::<i64>(&ctx(), x, dims, keep_dim, &mut out),
        other => panic!("unexpected dtype {}", other),
    }
    .unwrap();
    out
}

/// Shape with 1..=3 axes of size 1..=4 plus matching f32 data
fn tensor_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<f32>)> {
    prop::collection::vec(1usize..=4, 1..=3).prop_flat_map(|shape| {
        let n: usize = shape.iter().product();
        (Just(shape), prop::collection::vec(-1000.0f32..1000.0, n))
    })
}

#[test]
fn test_amax_example_vector() {
    let x = dense(&[3], vec![-5.0f32, 3.0, -2.0]);
    let out = amax(&x, &[], false);
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![5.0]);
    assert_eq!(out.numel(), 1);
}

#[test]
fn test_amax_example_shapes() {
    let x = dense(&[2, 3], vec![1i64, -2, 3, -4, 5, -6]);
    let kept = amax(&x, &[1], true);
    assert_eq!(kept.shape(), &[2, 1]);
    assert_eq!(kept.to_vec::<i64>().unwrap(), vec![3, 6]);

    let dropped = amax(&x, &[1], false);
    assert_eq!(dropped.shape(), &[2]);
    assert_eq!(dropped.to_vec::<i64>().unwrap(), vec![3, 6]);
}

proptest! {
    #[test]
    fn prop_full_reduction_is_max_abs((shape, data) in tensor_strategy()) {
        let expected = data.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let x = dense(&shape, data);
        let out = amax(&x, &[], false);
        prop_assert_eq!(out.shape(), &[] as &[usize]);
        prop_assert_eq!(out.to_vec::<f32>().unwrap(), vec![expected]);
    }

    #[test]
    fn prop_keep_dim_shape(
        (shape, data) in tensor_strategy(),
        axis_seed in 0usize..3,
        keep_dim: bool
    ) {
        let axis = axis_seed % shape.len();
        let x = dense(&shape, data);
        let out = amax(&x, &[axis as i64], keep_dim);

        let mut expected = shape.clone();
        if shape.len() == 1 {
            // Reducing the only axis reduces everything
            expected = if keep_dim { vec![1] } else { vec![] };
        } else if keep_dim {
            expected[axis] = 1;
        } else {
            expected.remove(axis);
        }
        prop_assert_eq!(out.shape(), expected.as_slice());
    }

    #[test]
    fn prop_adapter_matches_raw((shape, data) in tensor_strategy(), keep_dim: bool) {
        let x = dense(&shape, data);
        let dims = [-1i64];
        let mut a = DenseTensor::empty(DType::F32, Place::cpu());
        let mut b = DenseTensor::empty(DType::F32, Place::cpu());
        amax_kernel::<f32>(&ctx(), &x, &dims, keep_dim, &mut a).unwrap();
        amax_raw_kernel::<f32>(&ctx(), &x, &dims, keep_dim, false, &mut b).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_all_axes_same_as_none((shape, data) in tensor_strategy()) {
        let x = dense(&shape, data);
        let all: Vec<i64> = (0..shape.len() as i64).collect();
        prop_assert_eq!(amax(&x, &all, false), amax(&x, &[], false));
    }

    #[test]
    fn prop_amin_never_exceeds_amax((shape, data) in tensor_strategy()) {
        let x = dense(&shape, data);
        let mut lo = DenseTensor::empty(DType::F32, Place::cpu());
        amin_kernel::<f32>(&ctx(), &x, &[0], false, &mut lo).unwrap();
        let hi = amax(&x, &[0], false);
        for (l, h) in lo.to_vec::<f32>().unwrap().iter().zip(hi.to_vec::<f32>().unwrap()) {
            prop_assert!(*l <= h);
            prop_assert!(*l >= 0.0);
        }
    }

    #[test]
    fn prop_plan_out_numel_matches_kept_axes(shape in prop::collection::vec(1usize..=5, 2..=4)) {
        let plan = ReducePlan::new(&shape, &[0], false, false).unwrap();
        let expected: usize = shape[1..].iter().product();
        prop_assert_eq!(plan.out_numel(), expected);
    }
}
