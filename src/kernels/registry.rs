//! Process-wide kernel table keyed by (operator, backend, layout, dtype)
//!
//! Every operator has one generic kernel body per backend; registration
//! instantiates that body once per supported element type and stores one
//! entry per resulting [`KernelKey`]. Lookups fall back to the
//! [`DataLayout::All`] wildcard when no layout-specific entry exists.
//!
//! The table is filled during a startup phase (see [`global_registry`]) and
//! read concurrently afterwards. Registration takes a write lock, so backend
//! modules that register late are still synchronized.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;

use super::attrs::Attributes;
use crate::error::{ForgeResult, KernForgeError};
use crate::tensor::{Backend, DType, DataLayout, DenseTensor, DeviceContext};

static OP_NAMES: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Interned operator name ("amax", "scale", ...)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpName(Arc<str>);

impl OpName {
    pub fn intern(name: &str) -> Self {
        // A poisoned interner still holds valid names
        let mut names = OP_NAMES.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = names.get(name) {
            return OpName(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(name);
        names.insert(Arc::clone(&interned));
        OpName(interned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &*self.0)
    }
}

impl From<&str> for OpName {
    fn from(name: &str) -> Self {
        OpName::intern(name)
    }
}

/// Identifies exactly one registered kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelKey {
    pub op: OpName,
    pub backend: Backend,
    pub layout: DataLayout,
    pub dtype: DType,
}

impl KernelKey {
    pub fn new(op: impl Into<OpName>, backend: Backend, layout: DataLayout, dtype: DType) -> Self {
        Self {
            op: op.into(),
            backend,
            layout,
            dtype,
        }
    }

    fn with_layout(&self, layout: DataLayout) -> Self {
        Self {
            layout,
            ..self.clone()
        }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.op, self.backend, self.layout, self.dtype
        )
    }
}

/// Inputs and attributes handed to a kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelArgs<'a> {
    pub inputs: &'a [&'a DenseTensor],
    pub attrs: &'a Attributes,
}

impl<'a> KernelArgs<'a> {
    pub fn new(inputs: &'a [&'a DenseTensor], attrs: &'a Attributes) -> Self {
        Self { inputs, attrs }
    }

    pub fn input(&self, index: usize) -> ForgeResult<&'a DenseTensor> {
        self.inputs.get(index).copied().ok_or_else(|| {
            KernForgeError::InvalidGraph(format!(
                "kernel expects input #{}, only {} given",
                index,
                self.inputs.len()
            ))
        })
    }

    pub fn attrs(&self) -> &'a Attributes {
        self.attrs
    }
}

/// Kernel signature: computes into `out`, which arrives as an empty tensor
/// of the output dtype on the target place.
pub type KernelFn = fn(&DeviceContext, &KernelArgs<'_>, &mut DenseTensor) -> ForgeResult<()>;

/// Per-entry metadata a registration hook may adjust.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelArgsDef {
    /// Output element type; `None` means "same as the first input"
    pub output_dtype: Option<DType>,
}

/// Post-registration hook run once per registered entry.
pub type KernelArgsHook = fn(&KernelKey, &mut KernelArgsDef);

/// Default hook: leaves the metadata untouched
pub fn no_op_hook(_key: &KernelKey, _def: &mut KernelArgsDef) {}

/// A registered kernel together with its metadata.
#[derive(Debug, Clone)]
pub struct KernelEntry {
    pub func: KernelFn,
    pub args_def: KernelArgsDef,
}

/// What to do when a key is registered twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Reject the second registration with `DuplicateKernel`
    #[default]
    Error,
    /// Replace the existing entry and log a warning
    Overwrite,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub duplicate_policy: DuplicatePolicy,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Kernel table.
pub struct KernelRegistry {
    config: RegistryConfig,
    kernels: RwLock<HashMap<KernelKey, KernelEntry>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            kernels: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn register(&self, key: KernelKey, func: KernelFn) -> ForgeResult<()> {
        self.register_with_hook(key, func, no_op_hook)
    }

    pub fn register_with_hook(
        &self,
        key: KernelKey,
        func: KernelFn,
        hook: KernelArgsHook,
    ) -> ForgeResult<()> {
        let mut args_def = KernelArgsDef::default();
        hook(&key, &mut args_def);

        let mut kernels = self.kernels.write()?;
        if kernels.contains_key(&key) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Error => return Err(KernForgeError::DuplicateKernel { key }),
                DuplicatePolicy::Overwrite => {
                    tracing::warn!(kernel = %key, "overwriting registered kernel");
                }
            }
        }
        tracing::debug!(kernel = %key, "registered kernel");
        kernels.insert(key, KernelEntry { func, args_def });
        Ok(())
    }

    /// Resolve a key, trying the exact layout first and then the wildcard.
    pub fn lookup(&self, key: &KernelKey) -> ForgeResult<KernelEntry> {
        let kernels = self.kernels.read()?;
        if let Some(entry) = kernels.get(key) {
            return Ok(entry.clone());
        }
        if key.layout != DataLayout::All {
            if let Some(entry) = kernels.get(&key.with_layout(DataLayout::All)) {
                return Ok(entry.clone());
            }
        }
        Err(KernForgeError::KernelNotFound {
            key: key.to_string(),
        })
    }

    /// Whether any dtype of `op` is registered for `backend`
    pub fn contains_op(&self, op: &str, backend: Backend) -> bool {
        match self.kernels.read() {
            Ok(kernels) => kernels
                .keys()
                .any(|k| k.op.as_str() == op && k.backend == backend),
            Err(_) => false,
        }
    }

    /// All keys registered for `op`, sorted
    pub fn kernels_for(&self, op: &str) -> Vec<KernelKey> {
        let mut keys: Vec<KernelKey> = self
            .keys()
            .into_iter()
            .filter(|k| k.op.as_str() == op)
            .collect();
        keys.sort();
        keys
    }

    /// All registered keys, sorted
    pub fn keys(&self) -> Vec<KernelKey> {
        let mut keys: Vec<KernelKey> = match self.kernels.read() {
            Ok(kernels) => kernels.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.kernels.read().map(|k| k.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("config", &self.config)
            .field("kernels", &self.len())
            .finish()
    }
}

static GLOBAL_REGISTRY: Lazy<KernelRegistry> = Lazy::new(|| {
    let registry = KernelRegistry::new();
    // A partial builtin table would surface later as misleading lookup misses
    super::builtin::register_builtin_kernels(&registry)
        .expect("builtin kernel registration must succeed");
    tracing::debug!(kernels = registry.len(), "kernel registry initialized");
    registry
});

/// The process-wide registry, populated with the builtin kernels on first use.
pub fn global_registry() -> &'static KernelRegistry {
    &GLOBAL_REGISTRY
}

/// Register one generic kernel body for several element types.
///
/// ```ignore
/// register_kernel!(registry, "amax", Backend::Cpu, DataLayout::All,
///                  reduce::amax_entry, [f32, f64, i32, i64])?;
/// ```
///
/// An optional trailing hook (`fn(&KernelKey, &mut KernelArgsDef)`) runs
/// for each entry. Expands to a `ForgeResult<()>` that stops at the first
/// failed registration.
#[macro_export]
macro_rules! register_kernel {
    (@hook) => {
        $crate::kernels::registry::no_op_hook
    };
    (@hook $hook:expr) => {
        $hook
    };
    (@each $registry:ident, $result:ident, $keyargs:tt, $func:tt, $hook:tt $(,)?) => {};
    (
        @each $registry:ident, $result:ident, ($op:expr, $backend:expr, $layout:expr),
        [$($func:ident)::+], [$($hook:expr)?], $ty:ty $(, $rest:ty)*
    ) => {
        if $result.is_ok() {
            $result = $registry.register_with_hook(
                $crate::kernels::KernelKey::new(
                    $op,
                    $backend,
                    $layout,
                    <$ty as $crate::tensor::Element>::DTYPE,
                ),
                $($func)::+::<$ty> as $crate::kernels::KernelFn,
                $crate::register_kernel!(@hook $($hook)?),
            );
        }
        $crate::register_kernel!(
            @each $registry, $result, ($op, $backend, $layout),
            [$($func)::+], [$($hook)?] $(, $rest)*
        );
    };
    (
        $registry:expr,
        $op:expr,
        $backend:expr,
        $layout:expr,
        $($func:ident)::+,
        [$($ty:ty),+ $(,)?]
        $(, $hook:expr)?
    ) => {{
        let registry: &$crate::kernels::KernelRegistry = &$registry;
        let mut result: $crate::error::ForgeResult<()> = Ok(());
        $crate::register_kernel!(
            @each registry, result, ($op, $backend, $layout),
            [$($func)::+], [$($hook)?], $($ty),+
        );
        result
    }};
}
