//! Error types used by the deferral backends.
//!
//! Failures of a [`Task`](crate::Task) itself are plain values passed to
//! its reject channel and never show up here. [`DeferError`] only covers
//! the infrastructure that runs deferred jobs and timers.

use crate::defer::Backend;

use std::io;
use thiserror::Error;

/// # Errors produced while scheduling deferred work.
///
/// Returned when a deferral backend cannot accept a job, either because
/// it is unavailable on the current thread or because its background
/// thread could not be started or has stopped.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DeferError {
    /// The microtask queue only accepts jobs while a fork is running on
    /// the current thread.
    #[error("no fork is running on this thread; the microtask queue is unavailable")]
    NoActiveFork,

    /// The background thread of a backend could not be spawned.
    #[error("failed to start the {backend} thread: {source}")]
    Spawn {
        /// Backend whose thread failed to start.
        backend: Backend,
        /// Error reported by the OS.
        #[source]
        source: io::Error,
    },

    /// The background thread of a backend has exited.
    #[error("the {backend} thread has stopped")]
    Closed {
        /// Backend whose thread is gone.
        backend: Backend,
    },
}

impl DeferError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lazy_task::DeferError;
    ///
    /// assert_eq!(DeferError::NoActiveFork.as_label(), "defer_no_active_fork");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DeferError::NoActiveFork => "defer_no_active_fork",
            DeferError::Spawn { .. } => "defer_spawn_failed",
            DeferError::Closed { .. } => "defer_closed",
        }
    }
}
