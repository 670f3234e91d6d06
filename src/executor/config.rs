//! Executor configuration

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ExecutionStrategy::num_threads`]
pub const NUM_THREADS_ENV: &str = "KERNFORGE_NUM_THREADS";

/// How a [`ParallelExecutor`](super::ParallelExecutor) schedules nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStrategy {
    /// Worker threads in the executor's pool; 0 lets rayon decide
    pub num_threads: usize,
    /// When false, nodes run one at a time on the calling thread
    pub allow_parallel: bool,
    /// Successful runs between two drops of the intermediate variables
    /// left in the scope; 0 never drops
    pub num_iteration_per_drop_scope: usize,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self {
            num_threads: 0,
            allow_parallel: true,
            num_iteration_per_drop_scope: 1,
        }
    }
}

impl ExecutionStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy that runs every node on the calling thread
    pub fn sequential() -> Self {
        Self::default().with_allow_parallel(false)
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_allow_parallel(mut self, allow_parallel: bool) -> Self {
        self.allow_parallel = allow_parallel;
        self
    }

    pub fn with_drop_scope_interval(mut self, iterations: usize) -> Self {
        self.num_iteration_per_drop_scope = iterations;
        self
    }

    /// Defaults, with `KERNFORGE_NUM_THREADS` applied when it parses.
    pub fn from_env() -> Self {
        let mut strategy = Self::default();
        if let Ok(value) = std::env::var(NUM_THREADS_ENV) {
            match value.trim().parse::<usize>() {
                Ok(n) => strategy.num_threads = n,
                Err(_) => tracing::warn!(
                    value = %value,
                    "ignoring {} (expected a thread count)",
                    NUM_THREADS_ENV
                ),
            }
        }
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_strategy_default() {
        let strategy = ExecutionStrategy::default();
        assert_eq!(strategy.num_threads, 0);
        assert!(strategy.allow_parallel);
        assert_eq!(strategy.num_iteration_per_drop_scope, 1);
    }

    #[test]
    fn test_strategy_builder() {
        let strategy = ExecutionStrategy::new()
            .with_num_threads(4)
            .with_allow_parallel(false)
            .with_drop_scope_interval(10);
        assert_eq!(strategy.num_threads, 4);
        assert!(!strategy.allow_parallel);
        assert_eq!(strategy.num_iteration_per_drop_scope, 10);
        assert!(!ExecutionStrategy::sequential().allow_parallel);
    }

    #[test]
    #[serial]
    fn test_strategy_from_env() {
        std::env::set_var(NUM_THREADS_ENV, "3");
        assert_eq!(ExecutionStrategy::from_env().num_threads, 3);

        std::env::set_var(NUM_THREADS_ENV, "many");
        assert_eq!(ExecutionStrategy::from_env().num_threads, 0);

        std::env::remove_var(NUM_THREADS_ENV);
    }
}
