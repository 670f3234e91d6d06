//! Graph execution: strategy, variable scope and the parallel executor

pub mod config;
pub mod parallel;
pub mod scope;

pub use config::{ExecutionStrategy, NUM_THREADS_ENV};
pub use parallel::{ExecutorState, ParallelExecutor, RunStats};
pub use scope::VariableScope;
