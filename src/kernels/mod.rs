//! Kernel registry and builtin kernels

pub mod attrs;
pub mod builtin;
pub mod elementwise;
pub mod reduce;
pub mod registry;

pub use attrs::{AttrValue, Attributes};
pub use builtin::register_builtin_kernels;
pub use registry::{
    global_registry, no_op_hook, DuplicatePolicy, KernelArgs, KernelArgsDef, KernelArgsHook,
    KernelEntry, KernelFn, KernelKey, KernelRegistry, OpName, RegistryConfig,
};
