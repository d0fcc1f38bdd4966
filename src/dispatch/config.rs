//! Dispatcher construction-time configuration.

use crate::error::DispatchError;

/// Requested number of worker routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// One worker per logical CPU available to the process.
    Auto,
    /// A fixed number of workers. Must be at least 1.
    Fixed(usize),
}

impl Parallelism {
    /// Resolves to a concrete worker count.
    pub(crate) fn resolve(self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Fixed(workers) => workers,
        }
    }
}

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker routines started immediately at construction.
    pub parallelism: Parallelism,
    /// Upper bound on the pending-item count; posts beyond it are rejected
    /// with [`DispatchError::QueueFull`]. `None` disables backpressure.
    pub capacity_limit: Option<usize>,
    /// Name included in log events, useful when several dispatchers run in
    /// the same process.
    pub name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Auto,
            capacity_limit: None,
            name: "dispatcher".to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Creates a configuration with a fixed number of workers.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: Parallelism::Fixed(parallelism),
            ..Default::default()
        }
    }

    /// Creates a configuration using the available hardware parallelism.
    pub fn auto() -> Self {
        Self::default()
    }

    /// Sets the capacity limit for backpressure.
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.capacity_limit = Some(limit);
        self
    }

    /// Sets the dispatcher name used in log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidParallelism` if a fixed parallelism of
    /// zero workers is requested. Invalid values fail fast here rather than
    /// being silently clamped.
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self.parallelism {
            Parallelism::Fixed(0) => Err(DispatchError::InvalidParallelism { requested: 0 }),
            _ => Ok(()),
        }
    }
}
