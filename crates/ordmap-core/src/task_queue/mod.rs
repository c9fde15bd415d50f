//! Ordered concurrent map on explicit rayon pools.
//!
//! One task per element, each committing to its own pre-allocated slot;
//! the scope join is the single barrier the caller waits on.

mod mapper;
mod progress;

pub use mapper::{map_ordered, map_sequential, shared_pool, OrderedMapper, WorkerPool};
pub use progress::Completion;
