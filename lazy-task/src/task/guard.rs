use super::callback::{Callback, Handle};
use super::core::CleanupFn;
use crate::defer::Deferrer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{trace, warn};

/// Neither inner task has settled the outer one yet.
pub(crate) const PENDING: usize = 0;

/// The outer task has been settled.
///
/// Set exactly once, by the first channel invocation that reaches the
/// guard. Every later invocation is discarded.
pub(crate) const SETTLED: usize = 1 << 0;

/// Both inner forks have returned and their handles are stored.
pub(crate) const HANDLES_READY: usize = 1 << 1;

/// The outer callback that won has returned (or unwound).
///
/// An inner task may settle synchronously, before the fork that started
/// it returns, or on another thread while the fork is still running.
/// Whichever of `FORWARDED` and `HANDLES_READY` is set second schedules
/// the aggregate cleanup, so it never overlaps the winning callback.
pub(crate) const FORWARDED: usize = 1 << 2;

/// Per-fork settlement state shared by two concurrently driven tasks.
///
/// A fresh `Guard` is created for every fork of a composite task. It
/// forwards the first settlement to the outer callbacks, drops the rest,
/// and releases both inner handles exactly once through the deferrer.
pub(crate) struct Guard {
    /// Bit set of `SETTLED`, `HANDLES_READY` and `FORWARDED`.
    state: AtomicUsize,

    /// Handles returned by the two inner forks, taken on release.
    handles: Mutex<Option<(Handle, Handle)>>,

    /// Cleanup of the task forked first.
    first_cleanup: CleanupFn,

    /// Cleanup of the task forked second.
    second_cleanup: CleanupFn,

    deferrer: Deferrer,
}

impl Guard {
    pub(crate) fn new(first_cleanup: CleanupFn, second_cleanup: CleanupFn, deferrer: Deferrer) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicUsize::new(PENDING),
            handles: Mutex::new(None),
            first_cleanup,
            second_cleanup,
            deferrer,
        })
    }

    /// Whether the outer task has been settled.
    pub(crate) fn is_settled(&self) -> bool {
        self.state.load(Ordering::Acquire) & SETTLED != 0
    }

    /// Settles the outer task by running `forward`, unless it is already
    /// settled.
    ///
    /// The check and the transition are a single atomic operation, so two
    /// racing settlements cannot both forward. Returns `true` for the
    /// winner.
    pub(crate) fn settle(self: &Arc<Self>, forward: impl FnOnce()) -> bool {
        let previous = self.state.fetch_or(SETTLED, Ordering::AcqRel);

        if previous & SETTLED != 0 {
            trace!("late settlement discarded");
            return false;
        }

        trace!("composite task settled");

        let _forwarded = Forwarded(self);
        forward();

        true
    }

    /// Wraps an outer callback so that it only fires if it wins the guard.
    pub(crate) fn gate<T: Send + 'static>(self: &Arc<Self>, target: Callback<T>) -> Callback<T> {
        let guard = self.clone();

        Callback::new(move |value| {
            guard.settle(|| target.call(value));
        })
    }

    /// Stores the handles of both inner forks once they have returned.
    pub(crate) fn arm(self: &Arc<Self>, first: Handle, second: Handle) {
        *self.handles.lock().unwrap_or_else(PoisonError::into_inner) = Some((first, second));

        let previous = self.state.fetch_or(HANDLES_READY, Ordering::AcqRel);

        if previous & FORWARDED != 0 {
            self.schedule_release();
        }
    }

    /// The handle the composite fork returns.
    pub(crate) fn handle(self: &Arc<Self>) -> Handle {
        Handle::new(self.clone())
    }

    /// Cleanup function of composite tasks.
    ///
    /// Releases through the guard carried by the handle, so an explicit
    /// call and the guard's own deferred release share the same latch.
    pub(crate) fn release_handle(handle: Handle) {
        if let Some(guard) = handle.downcast_ref::<Arc<Guard>>() {
            guard.release();
        }
    }

    /// Runs both inner cleanups, at most once over the guard's lifetime.
    pub(crate) fn release(&self) {
        let taken = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some((first, second)) = taken {
            trace!("releasing inner handles");
            (self.first_cleanup)(first);
            (self.second_cleanup)(second);
        }
    }

    fn schedule_release(self: &Arc<Self>) {
        let guard = self.clone();

        if let Err(refused) = self.deferrer.defer(Box::new(move || guard.release())) {
            warn!(
                reason = refused.error.as_label(),
                "deferrer refused cleanup; releasing inline"
            );
            (refused.job)();
        }
    }
}

/// Marks the winning callback as returned when dropped, unwinding
/// included.
struct Forwarded<'a>(&'a Arc<Guard>);

impl Drop for Forwarded<'_> {
    fn drop(&mut self) {
        let previous = self.0.state.fetch_or(FORWARDED, Ordering::AcqRel);

        if previous & HANDLES_READY != 0 {
            self.0.schedule_release();
        }
    }
}
