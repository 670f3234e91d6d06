//! Callable Function Integration Tests
//!
//! Tests for PeFunction / ExecutorFunction / Layer covering:
//! - Lazy, one-time graph and executor construction
//! - Arity errors raised before execution
//! - Tensor and DenseTensor calls producing identical results
//! - Execution failures leaving the function usable
//! - Independent instances running concurrently
//! - Functions loaded from JSON files
//!
//! Run with: cargo test --test function_tests

mod common;

use std::sync::Arc;

use common::fixtures::{amax_info, dense, guarded_info, scored_info, scored_params};
use common::tempfile_helpers::{create_temp_dir, save_function, write_json_temp};
use common::test_registry;
use kernforge::error::KernForgeError;
use kernforge::executor::ExecutionStrategy;
use kernforge::jit::{BaseFunction, ExecutorFunction, FunctionInfo, Layer, ParamMap, PeFunction};
use kernforge::tensor::{DType, DenseTensor, Place, Tensor, TensorLiteral};

fn x23() -> DenseTensor {
    dense(&[2, 3], vec![-5.0f32, 3.0, -2.0, 1.0, -0.5, 4.0])
}

#[test]
fn test_graph_built_once_across_calls() {
    let mut f = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    assert!(!f.is_ready());

    let first = f.call_dense(&[x23()]).unwrap();
    assert_eq!(f.graph_builds(), 1);
    let second = f.call_dense(&[x23()]).unwrap();
    assert_eq!(f.graph_builds(), 1);
    assert_eq!(first, second);
}

#[test]
fn test_scored_outputs() {
    let mut f = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    let out = f.call_dense(&[x23()]).unwrap();
    assert_eq!(out.len(), 2);

    // h = 2|x| + 0.5 = [[10.5, 6.5, 4.5], [2.5, 1.5, 8.5]]
    assert_eq!(out[0].shape(), &[2]);
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![10.5, 8.5]);
    assert_eq!(out[1].shape(), &[] as &[usize]);
    assert_eq!(out[1].to_vec::<f32>().unwrap(), vec![1.5]);
}

#[test]
fn test_arity_error_before_execution() {
    let mut f = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    let scope_before: Vec<String> = f.scope().var_names().iter().map(|s| s.to_string()).collect();

    for inputs in [vec![], vec![x23(), x23()]] {
        let err = f.call_dense(&inputs).unwrap_err();
        assert!(matches!(err, KernForgeError::ArityMismatch { expected: 1, .. }));
    }
    assert!(!f.is_ready(), "arity failure must not build the graph");
    assert_eq!(f.graph_builds(), 0);
    let scope_after: Vec<String> = f.scope().var_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(scope_before, scope_after);
}

#[test]
fn test_declared_dtype_checked() {
    let mut f = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    let err = f.call_dense(&[dense(&[2], vec![1i32, 2])]).unwrap_err();
    assert!(matches!(
        err,
        KernForgeError::DTypeMismatch { expected: DType::F32, got: DType::I32 }
    ));
}

#[test]
fn test_tensor_and_dense_agree() {
    let mut f = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    let dense_out = f.call_dense(&[x23()]).unwrap();
    let tensor_out = f.call(&[Tensor::new(x23())]).unwrap();

    assert_eq!(tensor_out.len(), dense_out.len());
    for (t, d) in tensor_out.iter().zip(&dense_out) {
        assert_eq!(t.dense(), d);
    }
    assert_eq!(tensor_out[0].name(), Some("y"));
    assert_eq!(tensor_out[1].name(), Some("z"));
}

#[test]
fn test_execution_error_keeps_function_usable() {
    let mut f = PeFunction::new(guarded_info(), &ParamMap::new(), Place::cpu())
        .unwrap()
        .with_registry(test_registry());

    let err = f.call_dense(&[dense(&[2], vec![1i64, -1])]).unwrap_err();
    match &err {
        KernForgeError::Execution { op, node, .. } => {
            assert_eq!(op, "fail_if_negative");
            assert_eq!(*node, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
    assert!(!f.scope().contains("y"));

    let out = f.call_dense(&[dense(&[2], vec![1i64, 2])]).unwrap();
    assert_eq!(out[0].to_vec::<i64>().unwrap(), vec![1, 2]);
    assert_eq!(f.graph_builds(), 1);
}

#[test]
fn test_sequential_overflow_is_error_and_function_stays_usable() {
    let info = Arc::new(FunctionInfo {
        program: kernforge::graph::ProgramDesc::new().with_op(
            kernforge::graph::OpDesc::new("elementwise_add").input("x").input("x").output("y"),
        ),
        ..(*guarded_info()).clone()
    });
    let mut eager = ExecutorFunction::new(info.clone(), &ParamMap::new(), Place::cpu()).unwrap();
    let mut lazy = PeFunction::new(info, &ParamMap::new(), Place::cpu())
        .unwrap()
        .with_strategy(ExecutionStrategy::sequential());

    let functions: [&mut dyn BaseFunction; 2] = [&mut eager, &mut lazy];
    for f in functions {
        let err = f.call_dense(&[dense(&[1], vec![i32::MAX])]).unwrap_err();
        assert!(matches!(err, KernForgeError::Execution { ref op, .. } if op == "elementwise_add"));

        let out = f.call_dense(&[dense(&[2], vec![20i32, -3])]).unwrap();
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![40, -6]);
    }
}

#[test]
fn test_unknown_dtype_propagates_kernel_not_found() {
    // slow_identity exists only for floats, so the graph builds but an
    // integer input has no instantiation
    let info = Arc::new(FunctionInfo {
        program: kernforge::graph::ProgramDesc::new().with_op(
            kernforge::graph::OpDesc::new("slow_identity").input("x").output("y"),
        ),
        ..(*guarded_info()).clone()
    });
    let mut g = PeFunction::new(info, &ParamMap::new(), Place::cpu())
        .unwrap()
        .with_registry(test_registry());
    let err = g.call_dense(&[dense(&[1], vec![3i32])]).unwrap_err();
    assert!(matches!(err, KernForgeError::KernelNotFound { .. }));
}

#[test]
fn test_independent_instances_run_concurrently() {
    let info = scored_info();
    let params = scored_params();
    let inputs: Vec<DenseTensor> = (0..4)
        .map(|i| dense(&[2, 3], vec![-1.0f32 * i as f32, 2.0, -3.0, 4.0, -5.0, 6.0]))
        .collect();

    let sequential: Vec<Vec<DenseTensor>> = inputs
        .iter()
        .map(|x| {
            let mut f = PeFunction::new(info.clone(), &params, Place::cpu()).unwrap();
            f.call_dense(std::slice::from_ref(x)).unwrap()
        })
        .collect();

    let concurrent: Vec<Vec<DenseTensor>> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|x| {
                let info = info.clone();
                let params = &params;
                s.spawn(move || {
                    let mut f = PeFunction::new(info, params, Place::cpu()).unwrap();
                    let mut last = Vec::new();
                    for _ in 0..10 {
                        last = f.call_dense(std::slice::from_ref(x)).unwrap();
                    }
                    last
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

#[test]
fn test_two_instances_share_info_identically() {
    let info = amax_info(vec![1], true);
    let mut a = PeFunction::new(info.clone(), &ParamMap::new(), Place::cpu()).unwrap();
    let mut b = ExecutorFunction::new(info.clone(), &ParamMap::new(), Place::cpu()).unwrap();
    assert!(Arc::ptr_eq(a.info(), b.info()));

    let out_a = a.call_dense(&[x23()]).unwrap();
    let out_b = b.call_dense(&[x23()]).unwrap();
    assert_eq!(out_a, out_b);
    assert_eq!(out_a[0].shape(), &[2, 1]);
}

#[test]
fn test_function_from_json_file() {
    let dir = create_temp_dir().unwrap();
    let path = save_function(&dir, &scored_info()).unwrap();

    let loaded = FunctionInfo::from_file(&path).unwrap();
    assert_eq!(&loaded, scored_info().as_ref());

    let mut f = PeFunction::new(Arc::new(loaded), &scored_params(), Place::cpu())
        .unwrap()
        .with_strategy(ExecutionStrategy::sequential());
    let out = f.call_dense(&[x23()]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![10.5, 8.5]);
}

#[test]
fn test_tensor_literals_from_json_file() {
    let literals = vec![TensorLiteral {
        name: Some("x".to_string()),
        shape: vec![3],
        dtype: DType::I32,
        data: vec![-5.0, 3.0, -2.0],
    }];
    let file = write_json_temp(&literals).unwrap();
    let text = std::fs::read_to_string(file.path()).unwrap();
    let parsed: Vec<TensorLiteral> = serde_json::from_str(&text).unwrap();

    let mut f = PeFunction::new(amax_info(vec![], false), &ParamMap::new(), Place::cpu()).unwrap();
    let out = f.call_dense(&[parsed[0].to_dense(Place::cpu()).unwrap()]).unwrap();
    assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![5]);
}

#[test]
fn test_layer_forward() {
    let mut layer = Layer::from_infos([scored_info()], &scored_params(), Place::cpu()).unwrap();
    let amax_fn = PeFunction::new(amax_info(vec![0], false), &ParamMap::new(), Place::cpu());
    layer.add_function("amax_fn", Box::new(amax_fn.unwrap()));
    assert_eq!(layer.function_names(), vec!["amax_fn", "forward"]);

    let out = layer.forward(&[Tensor::new(x23())]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![10.5, 8.5]);

    let out = layer.call("amax_fn", &[Tensor::new(x23())]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![5.0, 3.0, 4.0]);
}

#[test]
#[cfg(not(feature = "gpu"))]
fn test_gpu_place_rejected_at_construction() {
    let err = PeFunction::new(scored_info(), &scored_params(), Place::gpu(0)).unwrap_err();
    assert!(matches!(err, KernForgeError::InvalidPlace(_)));
}

#[test]
#[cfg(feature = "gpu")]
fn test_gpu_place_runs_same_results() {
    let mut cpu = PeFunction::new(scored_info(), &scored_params(), Place::cpu()).unwrap();
    let mut gpu = PeFunction::new(scored_info(), &scored_params(), Place::gpu(0)).unwrap();
    let a = cpu.call_dense(&[x23()]).unwrap();
    let b = gpu.call_dense(&[x23()]).unwrap();
    assert_eq!(b[0].place(), Place::gpu(0));
    assert_eq!(a[0].to_vec::<f32>().unwrap(), b[0].to_vec::<f32>().unwrap());
}
