//! Program and function builders used across suites

use std::sync::Arc;

use kernforge::graph::{OpDesc, ProgramDesc};
use kernforge::jit::{Argument, FunctionInfo, FunctionSchema, ParamMap};
use kernforge::tensor::{DType, DenseTensor, Element};

pub fn dense<T: Element>(shape: &[usize], data: Vec<T>) -> DenseTensor {
    DenseTensor::from_vec(shape.to_vec(), data).expect("fixture tensor")
}

/// `y = amax(x, dims, keep_dim)`
pub fn amax_info(dims: Vec<i64>, keep_dim: bool) -> Arc<FunctionInfo> {
    Arc::new(FunctionInfo::new(
        "amax_fn",
        FunctionSchema::new()
            .with_input(Argument::new("x"))
            .with_output(Argument::new("y")),
        vec![],
        ProgramDesc::new().with_op(
            OpDesc::new("amax")
                .input("x")
                .output("y")
                .attr("dims", dims)
                .attr("keep_dim", keep_dim),
        ),
    ))
}

/// Two-output function with a parameter:
/// `h = |x| * 2 + bias_w ; y = amax(h, [-1]) ; z = amin(h)`
pub fn scored_info() -> Arc<FunctionInfo> {
    Arc::new(FunctionInfo::new(
        "forward",
        FunctionSchema::new()
            .with_input(Argument::typed("x", DType::F32))
            .with_output(Argument::new("y"))
            .with_output(Argument::new("z")),
        vec!["bias_w".to_string()],
        ProgramDesc::new()
            .with_op(OpDesc::new("abs").input("x").output("ax"))
            .with_op(OpDesc::new("scale").input("ax").output("sx").attr("scale", 2.0))
            .with_op(
                OpDesc::new("elementwise_add")
                    .input("sx")
                    .input("bias_w")
                    .output("h"),
            )
            .with_op(OpDesc::new("amax").input("h").output("y").attr("dims", vec![-1i64]))
            .with_op(OpDesc::new("amin").input("h").output("z")),
    ))
}

pub fn scored_params() -> ParamMap {
    let mut params = ParamMap::new();
    params.insert(
        "bias_w".to_string(),
        Arc::new(DenseTensor::scalar(0.5f32)),
    );
    params
}

/// `y = fail_if_negative(x)`
pub fn guarded_info() -> Arc<FunctionInfo> {
    Arc::new(FunctionInfo::new(
        "guarded",
        FunctionSchema::new()
            .with_input(Argument::new("x"))
            .with_output(Argument::new("y")),
        vec![],
        ProgramDesc::new().with_op(OpDesc::new("fail_if_negative").input("x").output("y")),
    ))
}

/// `width` independent slow branches joined pairwise into one sum
pub fn wide_program(width: usize) -> ProgramDesc {
    let mut program = ProgramDesc::new();
    for i in 0..width {
        program.push_op(
            OpDesc::new("slow_identity")
                .input("x")
                .output(format!("b{}", i))
                .attr("delay_ms", 30i64),
        );
    }
    let mut acc = "b0".to_string();
    for i in 1..width {
        let next = format!("s{}", i);
        program.push_op(
            OpDesc::new("elementwise_add")
                .input(acc.clone())
                .input(format!("b{}", i))
                .output(next.clone()),
        );
        acc = next;
    }
    program
}
