//! Core library for ordmap: ordered concurrent map executor, config, errors, workloads.
//! Used by the CLI binary; the mapper itself is usable from any crate.

pub mod config;
pub mod error;
pub mod task_queue;
pub mod workload;

// Re-export main API for CLI
pub use config::{load_config, Config, FailurePolicy, MapperConfig};
pub use error::{MapError, PartialMap, TaskFailure};
pub use task_queue::{
    map_ordered, map_sequential, shared_pool, Completion, OrderedMapper, WorkerPool,
};
pub use workload::{DelayRange, SlowCalculation, WorkloadError};
