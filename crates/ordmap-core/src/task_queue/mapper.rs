//! Ordered concurrent map: one task per element, each writing only its own slot.
//!
//! The output buffer is allocated before dispatch, so every index has a home
//! before its task starts. Tasks get a `&mut` to exactly one slot, so writes
//! need no lock. The rayon scope join is the completion barrier: the caller
//! never sees a partially filled buffer.

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::{FailurePolicy, MapperConfig};
use crate::error::{panic_message, MapError, PartialMap, TaskFailure};

use super::progress::Completion;

/// Where a mapper's tasks run.
#[derive(Clone, Debug, Default)]
pub enum WorkerPool {
    /// Build a pool for each call and drop it when the call returns.
    #[default]
    PerCall,
    /// Reuse a caller-owned pool across calls.
    Shared(Arc<ThreadPool>),
}

/// Build a pool suitable for [`WorkerPool::Shared`].
pub fn shared_pool(workers: usize) -> Result<Arc<ThreadPool>, MapError> {
    if workers == 0 {
        return Err(MapError::precondition("workers", "must be at least 1"));
    }
    build_pool(workers).map(Arc::new)
}

fn build_pool(workers: usize) -> Result<ThreadPool, MapError> {
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ordmap-worker-{}", i))
        .build()
        .map_err(|e| MapError::PoolBuild(e.to_string()))
}

/// Applies a blocking transform to every element concurrently, results index-aligned.
///
/// There is no cancellation and no timeout. A transform that never returns
/// hangs the whole call; callers that need a bound must build it into the
/// transform itself.
#[derive(Clone, Debug, Default)]
pub struct OrderedMapper {
    config: MapperConfig,
    pool: WorkerPool,
    completion: Option<Completion>,
}

impl OrderedMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            pool: WorkerPool::PerCall,
            completion: None,
        }
    }

    pub fn with_worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Run on a caller-owned pool. `max_workers` no longer applies; the pool's size does.
    pub fn with_pool(self, pool: Arc<ThreadPool>) -> Self {
        self.with_worker_pool(WorkerPool::Shared(pool))
    }

    /// Report task completions to `completion` as they happen.
    ///
    /// Counts add up across runs, including runs in flight at the same time
    /// on clones of this mapper.
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Map `input` through `transform`; `output[i] == transform(input[i])`.
    ///
    /// Empty input returns at once without building a pool. Every element gets
    /// its own task; a per-call pool has `min(n, max_workers)` threads, with
    /// [`DEFAULT_MAX_WORKERS`](crate::config::DEFAULT_MAX_WORKERS) when unset.
    pub fn run<T, R, F>(&self, input: Vec<T>, transform: F) -> Result<Vec<R>, MapError>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        self.dispatch(input, |item| Ok::<R, Infallible>(transform(item)))?
            .into_result()
    }

    /// Fail-fast run of a fallible transform.
    ///
    /// Every task still runs to completion; the failure with the lowest index is returned.
    pub fn try_run<T, R, E, F>(&self, input: Vec<T>, transform: F) -> Result<Vec<R>, MapError<E>>
    where
        T: Send,
        R: Send,
        E: std::error::Error + Send + 'static,
        F: Fn(T) -> Result<R, E> + Sync,
    {
        self.dispatch(input, transform)
            .map_err(|e| e.widen::<E>())?
            .into_result()
    }

    /// Collect-all run: successes stay at their index, failures are listed by index.
    pub fn run_partial<T, R, E, F>(
        &self,
        input: Vec<T>,
        transform: F,
    ) -> Result<PartialMap<R, E>, MapError>
    where
        T: Send,
        R: Send,
        E: Send,
        F: Fn(T) -> Result<R, E> + Sync,
    {
        self.dispatch(input, transform)
    }

    /// Run under `config().failure_policy`.
    ///
    /// Fail-fast turns the lowest-index failure into `Err`; collect-all always
    /// returns the partial map.
    pub fn run_with_policy<T, R, E, F>(
        &self,
        input: Vec<T>,
        transform: F,
    ) -> Result<PartialMap<R, E>, MapError<E>>
    where
        T: Send,
        R: Send,
        E: std::error::Error + Send + 'static,
        F: Fn(T) -> Result<R, E> + Sync,
    {
        let mut partial = self
            .dispatch(input, transform)
            .map_err(|e| e.widen::<E>())?;
        match self.config.failure_policy {
            FailurePolicy::FailFast if !partial.failures.is_empty() => {
                Err(partial.failures.swap_remove(0).into_error())
            }
            _ => Ok(partial),
        }
    }

    fn dispatch<T, R, E, F>(&self, input: Vec<T>, transform: F) -> Result<PartialMap<R, E>, MapError>
    where
        T: Send,
        R: Send,
        E: Send,
        F: Fn(T) -> Result<R, E> + Sync,
    {
        self.config.validate()?;

        let n = input.len();
        if let Some(completion) = &self.completion {
            completion.start(n);
        }
        if n == 0 {
            return Ok(PartialMap {
                slots: Vec::new(),
                failures: Vec::new(),
            });
        }

        let mut buffer: Vec<Option<Result<R, TaskFailure<E>>>> =
            std::iter::repeat_with(|| None).take(n).collect();

        let started = Instant::now();
        let completion = self.completion.as_ref();
        let transform = &transform;

        let per_call;
        let pool: &ThreadPool = match &self.pool {
            WorkerPool::Shared(pool) => pool,
            WorkerPool::PerCall => {
                per_call = build_pool(self.config.workers_for(n))?;
                &per_call
            }
        };
        tracing::debug!(
            tasks = n,
            workers = pool.current_num_threads(),
            "dispatching ordered map"
        );

        pool.scope(|scope| {
            for (index, (item, slot)) in input.into_iter().zip(buffer.iter_mut()).enumerate() {
                scope.spawn(move |_| {
                    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| transform(item))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(error)) => Err(TaskFailure::Failed { index, error }),
                        Err(payload) => Err(TaskFailure::Panicked {
                            index,
                            message: panic_message(payload.as_ref()),
                        }),
                    };
                    let ok = outcome.is_ok();
                    *slot = Some(outcome);
                    if let Some(completion) = completion {
                        completion.record(ok);
                    }
                });
            }
        });

        let mut slots = Vec::with_capacity(n);
        let mut failures = Vec::new();
        for (index, outcome) in buffer.into_iter().enumerate() {
            match outcome {
                Some(Ok(value)) => slots.push(Some(value)),
                Some(Err(failure)) => {
                    slots.push(None);
                    failures.push(failure);
                }
                None => return Err(MapError::IncompleteSlot { index }),
            }
        }

        if failures.is_empty() {
            tracing::debug!(
                tasks = n,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "all tasks finished"
            );
        } else {
            tracing::warn!(
                tasks = n,
                failed = failures.len(),
                first_index = failures[0].index(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tasks finished with failures"
            );
        }

        Ok(PartialMap { slots, failures })
    }
}

/// Ordered concurrent map with default settings: one task per element on a per-call pool.
pub fn map_ordered<T, R, F>(input: Vec<T>, transform: F) -> Result<Vec<R>, MapError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    OrderedMapper::default().run(input, transform)
}

/// Serial baseline: same results as [`map_ordered`], one element at a time on the calling thread.
pub fn map_sequential<T, R, F>(input: Vec<T>, transform: F) -> Vec<R>
where
    F: Fn(T) -> R,
{
    input.into_iter().map(transform).collect()
}
