use super::{Job, Refused, worker};
use crate::error::DeferError;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::thread;

use tracing::{debug, error};

thread_local! {
    /// Number of nested fork scopes currently open on this thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };

    /// Jobs waiting for the outermost scope to close.
    static QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
}

/// Runs `f` inside a microtask scope.
///
/// Scopes nest. When the outermost one closes, every queued job runs in
/// FIFO order, including jobs queued by jobs. If `f` panics the queued
/// jobs are handed to the worker thread instead.
pub(crate) fn enter<R>(f: impl FnOnce() -> R) -> R {
    let _scope = Scope::open();
    f()
}

/// Whether a scope is open on the current thread.
pub(crate) fn is_active() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

/// Queues `job` for the end of the outermost scope.
pub(crate) fn push(job: Job) -> Result<(), Refused> {
    if !is_active() {
        return Err(Refused {
            job,
            error: DeferError::NoActiveFork,
        });
    }

    QUEUE.with(|queue| queue.borrow_mut().push_back(job));
    Ok(())
}

fn drain() {
    loop {
        // The borrow must end before the job runs: jobs may queue more jobs.
        let next = QUEUE.with(|queue| queue.borrow_mut().pop_front());

        match next {
            Some(job) => job(),
            None => break,
        }
    }
}

/// Moves every queued job to the worker after the scope unwound.
///
/// Jobs cannot run here: a second panic while unwinding aborts.
fn hand_off() {
    let leftover: Vec<Job> = QUEUE.with(|queue| queue.borrow_mut().drain(..).collect());

    if leftover.is_empty() {
        return;
    }

    debug!(jobs = leftover.len(), "fork unwound; moving queued jobs to the worker");

    for job in leftover {
        if let Err(refused) = worker::push(job) {
            error!(reason = refused.error.as_label(), "deferred job dropped after unwind");
        }
    }
}

struct Scope;

impl Scope {
    fn open() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Scope
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        // Declared first so it is dropped last, even if a job unwinds.
        let _close = Close;

        if DEPTH.with(Cell::get) == 1 {
            if thread::panicking() {
                hand_off();
            } else {
                drain();
            }
        }
    }
}

struct Close;

impl Drop for Close {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}
