//! Completion counter shared between a run and whoever is watching it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts finished tasks across every run it is attached to.
///
/// Cloning is cheap; all clones observe the same counters. Each run adds its
/// task count to `total` and never rewinds `finished`, so runs that share one
/// `Completion` concurrently sum up. Call [`Completion::reset`] to reuse it
/// for an unrelated batch.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicUsize,
    finished: AtomicUsize,
    failed: AtomicUsize,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks dispatched so far.
    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Tasks that have committed a result or a failure.
    pub fn finished(&self) -> usize {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Tasks whose transform failed or panicked.
    pub fn failed(&self) -> usize {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// True once every dispatched task has finished.
    pub fn is_done(&self) -> bool {
        self.finished() >= self.total()
    }

    /// Zero every counter. Only meaningful while no attached run is in flight.
    pub fn reset(&self) {
        self.inner.finished.store(0, Ordering::Release);
        self.inner.failed.store(0, Ordering::Relaxed);
        self.inner.total.store(0, Ordering::Release);
    }

    pub(crate) fn start(&self, tasks: usize) {
        self.inner.total.fetch_add(tasks, Ordering::AcqRel);
    }

    pub(crate) fn record(&self, ok: bool) {
        if !ok {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.finished.fetch_add(1, Ordering::AcqRel);
    }
}
