//! Shared fixtures for the integration suites
//!
//! - [`TEST_REGISTRY`]: builtin kernels plus a few test-only kernels
//!   (a kernel that fails on negative input, one that panics on it,
//!   a slow identity)
//! - function/program builders in [`fixtures`]
//! - tempfile wrappers in [`tempfile_helpers`]
//!
//! Tests that install logging or read the global registry's size use
//! `#[serial]`.

#![allow(dead_code)]

pub mod fixtures;
pub mod tempfile_helpers;

use std::time::Duration;

use kernforge::error::{ForgeResult, KernForgeError};
use kernforge::kernels::{register_builtin_kernels, KernelArgs, KernelRegistry};
use kernforge::register_kernel;
use kernforge::tensor::{Backend, DataLayout, DenseTensor, DeviceContext, Element};
use once_cell::sync::Lazy;
pub use serial_test::serial;

/// Registry shared by every test in a binary; initialized once.
pub static TEST_REGISTRY: Lazy<KernelRegistry> = Lazy::new(|| {
    let registry = KernelRegistry::new();
    register_builtin_kernels(&registry).expect("builtin registration");
    register_kernel!(
        registry,
        "fail_if_negative",
        Backend::Cpu,
        DataLayout::All,
        fail_if_negative,
        [f32, f64, i32, i64]
    )
    .expect("fail_if_negative registration");
    register_kernel!(
        registry,
        "slow_identity",
        Backend::Cpu,
        DataLayout::All,
        slow_identity,
        [f32, f64]
    )
    .expect("slow_identity registration");
    register_kernel!(
        registry,
        "panicking_kernel",
        Backend::Cpu,
        DataLayout::All,
        panicking_kernel,
        [f32, i32]
    )
    .expect("panicking_kernel registration");
    registry
});

pub fn test_registry() -> &'static KernelRegistry {
    &TEST_REGISTRY
}

/// Copies its input, failing if any element is negative
pub fn fail_if_negative<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let x = args.input(0)?;
    let values = x.as_slice::<T>()?;
    if values.iter().any(|v| *v < T::zero()) {
        return Err(KernForgeError::InvalidShape("negative element".to_string()));
    }
    out.set_data(x.shape().to_vec(), values.to_vec())
}

/// Identity that sleeps for `delay_ms` (default 20)
pub fn slow_identity<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let delay = args.attrs().int_or("delay_ms", 20)?;
    std::thread::sleep(Duration::from_millis(delay.max(0) as u64));
    let x = args.input(0)?;
    out.set_data(x.shape().to_vec(), x.as_slice::<T>()?.to_vec())
}

/// Copies its input, panicking if any element is negative
pub fn panicking_kernel<T: Element>(
    _ctx: &DeviceContext,
    args: &KernelArgs<'_>,
    out: &mut DenseTensor,
) -> ForgeResult<()> {
    let x = args.input(0)?;
    let values = x.as_slice::<T>()?;
    if values.iter().any(|v| *v < T::zero()) {
        panic!("negative element reached panicking_kernel");
    }
    out.set_data(x.shape().to_vec(), values.to_vec())
}
