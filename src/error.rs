//! Unified error handling for kernforge
//!
//! A single error type covers every layer of the runtime:
//! - Dispatch errors (no kernel registered for a key, duplicate registration)
//! - Caller errors (wrong input count, unusable device placement, bad attributes)
//! - Execution errors (a kernel failed while the executor ran a node)
//! - Internal errors (poisoned locks, broken invariants)
//!
//! Nothing in the runtime retries automatically. Every failure is returned
//! synchronously to whoever triggered the operation.

use std::fmt;

use crate::kernels::KernelKey;

// Re-export thiserror for convenience
pub use thiserror;

/// Unified error type for kernforge
#[derive(Debug, thiserror::Error)]
pub enum KernForgeError {
    // ========== Dispatch Errors ==========
    /// No registered kernel matches the key, even under the layout wildcard
    #[error("Kernel not found: {key}")]
    KernelNotFound { key: String },

    /// A kernel was registered twice under the `Error` duplicate policy
    #[error("Kernel already registered: {key}")]
    DuplicateKernel { key: KernelKey },

    // ========== Caller Errors ==========
    /// Input count disagrees with the function's declared signature
    #[error("Function '{function}' expects {expected} inputs, got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    /// Requested device placement is not usable in this build
    #[error("Invalid place: {0}")]
    InvalidPlace(String),

    /// Attribute missing or of the wrong kind
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Variable missing from a scope or parameter map
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// No function of that name in a layer
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    // ========== Tensor Errors ==========
    /// Invalid tensor shape
    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),

    /// Element type disagrees with what the caller asked for
    #[error("DType mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        expected: crate::tensor::DType,
        got: crate::tensor::DType,
    },

    /// Integer result outside the element type's range
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Reduction axis outside the tensor's rank
    #[error("Dimension {dim} out of range for tensor of rank {rank}")]
    DimOutOfRange { dim: i64, rank: usize },

    // ========== Graph / Execution Errors ==========
    /// Program cannot be compiled into an execution graph
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A node's kernel failed during a run
    #[error("Execution failed in op '{op}' (node {node}): {message}")]
    Execution {
        op: String,
        node: usize,
        message: String,
    },

    // ========== I/O Errors ==========
    /// Malformed serialized function or tensor literal
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Internal Errors ==========
    /// Lock poisoned (a thread panicked while holding it)
    #[error("Internal lock poisoned: {0}")]
    LockPoisoned(String),

    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl KernForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            KernForgeError::ArityMismatch { .. }
            | KernForgeError::InvalidPlace(_)
            | KernForgeError::InvalidAttribute(_)
            | KernForgeError::VariableNotFound(_)
            | KernForgeError::FunctionNotFound(_)
            | KernForgeError::InvalidShape(_)
            | KernForgeError::DTypeMismatch { .. }
            | KernForgeError::DimOutOfRange { .. }
            | KernForgeError::ArithmeticOverflow(_)
            | KernForgeError::InvalidGraph(_)
            | KernForgeError::Serialization(_)
            | KernForgeError::Io(_) => ErrorCategory::User,

            KernForgeError::KernelNotFound { .. } | KernForgeError::DuplicateKernel { .. } => {
                ErrorCategory::Dispatch
            }

            KernForgeError::Execution { .. } => ErrorCategory::Execution,

            KernForgeError::LockPoisoned(_) | KernForgeError::InternalError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether a later call with the same object may succeed.
    ///
    /// Only execution failures qualify: the graph and scope stay valid after
    /// a failed run. The runtime itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Execution)
    }

    /// Check if this is a user-facing error (bad input or configuration)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this error means dispatch could not find a kernel
    pub fn is_dispatch_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Dispatch)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input, configuration or placement
    User,
    /// Kernel lookup or registration failed
    Dispatch,
    /// A kernel failed while running a graph node
    Execution,
    /// Indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Dispatch => write!(f, "Dispatch"),
            ErrorCategory::Execution => write!(f, "Execution"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for KernForgeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        KernForgeError::LockPoisoned(err.to_string())
    }
}

impl From<serde_json::Error> for KernForgeError {
    fn from(err: serde_json::Error) -> Self {
        KernForgeError::Serialization(err.to_string())
    }
}

/// Helper type alias for Results using KernForgeError
pub type ForgeResult<T> = std::result::Result<T, KernForgeError>;

/// Create an invalid-graph error with context
///
/// # Examples
/// ```ignore
/// return Err(invalid_graph!("variable '{}' has two producers", name));
/// ```
#[macro_export]
macro_rules! invalid_graph {
    ($msg:expr) => {
        $crate::error::KernForgeError::InvalidGraph($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::KernForgeError::InvalidGraph(format!($fmt, $($arg)*))
    };
}

/// Create an internal error with context
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::KernForgeError::InternalError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::KernForgeError::InternalError(format!($fmt, $($arg)*))
    };
}
