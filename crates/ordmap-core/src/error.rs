//! Error types for ordered map runs.
//! A run either yields every slot or reports which index broke it.

use std::convert::Infallible;
use std::fmt;

use thiserror::Error;

/// Main error type for mapper operations.
///
/// `E` is the transform's own error type. Infallible runs use [`Infallible`].
#[derive(Debug, Error)]
pub enum MapError<E = Infallible> {
    /// Rejected before any task was launched.
    #[error("invalid {field}: {reason}")]
    Precondition { field: &'static str, reason: String },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),

    /// A transform returned an error (fail-fast policy, lowest index wins).
    #[error("transform failed at index {index}: {source}")]
    Transform {
        index: usize,
        #[source]
        source: E,
    },

    /// A transform panicked.
    #[error("transform panicked at index {index}: {message}")]
    Panicked { index: usize, message: String },

    /// A slot was still unset after the barrier.
    #[error("output slot {index} was never written")]
    IncompleteSlot { index: usize },

    /// Config file unreadable or malformed.
    #[error("config error in {path}: {reason}")]
    Config { path: String, reason: String },
}

impl<E> MapError<E>
where
    E: std::error::Error + 'static,
{
    /// Index of the failing element, when the error is tied to one.
    pub fn index(&self) -> Option<usize> {
        match self {
            MapError::Transform { index, .. }
            | MapError::Panicked { index, .. }
            | MapError::IncompleteSlot { index } => Some(*index),
            _ => None,
        }
    }

    pub(crate) fn precondition(field: &'static str, reason: impl Into<String>) -> Self {
        MapError::Precondition {
            field,
            reason: reason.into(),
        }
    }
}

impl MapError<Infallible> {
    /// Widen an infallible-run error to any transform error type.
    pub fn widen<F>(self) -> MapError<F>
    where
        F: std::error::Error + 'static,
    {
        match self {
            MapError::Precondition { field, reason } => MapError::Precondition { field, reason },
            MapError::PoolBuild(msg) => MapError::PoolBuild(msg),
            MapError::Transform { source, .. } => match source {},
            MapError::Panicked { index, message } => MapError::Panicked { index, message },
            MapError::IncompleteSlot { index } => MapError::IncompleteSlot { index },
            MapError::Config { path, reason } => MapError::Config { path, reason },
        }
    }
}

/// What went wrong with one task under the collect-all policy.
#[derive(Debug)]
pub enum TaskFailure<E> {
    /// The transform returned an error.
    Failed { index: usize, error: E },
    /// The transform panicked.
    Panicked { index: usize, message: String },
}

impl<E> TaskFailure<E> {
    pub fn index(&self) -> usize {
        match self {
            TaskFailure::Failed { index, .. } | TaskFailure::Panicked { index, .. } => *index,
        }
    }

    /// Promote to a fail-fast error.
    pub fn into_error(self) -> MapError<E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            TaskFailure::Failed { index, error } => MapError::Transform {
                index,
                source: error,
            },
            TaskFailure::Panicked { index, message } => MapError::Panicked { index, message },
        }
    }
}

impl<E: fmt::Display> fmt::Display for TaskFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Failed { index, error } => write!(f, "index {}: {}", index, error),
            TaskFailure::Panicked { index, message } => {
                write!(f, "index {}: panicked: {}", index, message)
            }
        }
    }
}

/// Result of a collect-all run: successes stay at their index, failures are listed.
#[derive(Debug)]
pub struct PartialMap<R, E> {
    /// `Some` where the task succeeded, `None` where it failed.
    pub slots: Vec<Option<R>>,
    /// Sorted by index.
    pub failures: Vec<TaskFailure<E>>,
}

impl<R, E> PartialMap<R, E> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All values if nothing failed, else the lowest-index failure.
    pub fn into_result(self) -> Result<Vec<R>, MapError<E>>
    where
        E: std::error::Error + 'static,
    {
        if let Some(first) = self.failures.into_iter().next() {
            return Err(first.into_error());
        }
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(MapError::IncompleteSlot { index }))
            .collect()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
