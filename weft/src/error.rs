use thiserror::Error;

/// Errors produced by the scheduler itself, as opposed to errors returned
/// by task bodies.
///
/// Task results are carried as [`anyhow::Error`], so these variants reach
/// callers wrapped; use `downcast_ref::<weft::Error>()` to match on them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The task body panicked. Holds the panic message when it was a string.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task's result was already consumed through another await.
    #[error("task result already taken")]
    ResultTaken,

    /// The scheduler was closed before the task completed.
    #[error("scheduler closed")]
    Closed,
}
