#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use lazy_task::defer::{Defer, Job, Refused};
use lazy_task::{Callback, Task};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
///
/// Honours `RUST_LOG`; silent by default.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// What a fork settled with.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<F, S> {
    Rejected(F),
    Resolved(S),
}

/// Records every settlement delivered to the callbacks it hands out.
pub struct Probe<F, S> {
    inner: Arc<(Mutex<Vec<Settled<F, S>>>, Condvar)>,
}

impl<F, S> Clone for Probe<F, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F, S> Probe<F, S>
where
    F: Send + 'static,
    S: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(Vec::new()), Condvar::new())),
        }
    }

    /// Forks `task` with callbacks recording into this probe.
    pub fn fork(&self, task: &Task<F, S>) -> lazy_task::Handle {
        let on_reject = self.clone();
        let on_resolve = self.clone();

        task.fork(
            move |error| on_reject.push(Settled::Rejected(error)),
            move |value| on_resolve.push(Settled::Resolved(value)),
        )
    }

    fn push(&self, settled: Settled<F, S>) {
        let (log, condvar) = &*self.inner;
        log.lock().unwrap().push(settled);
        condvar.notify_all();
    }

    pub fn count(&self) -> usize {
        self.inner.0.lock().unwrap().len()
    }

    /// Blocks until at least `n` settlements arrived or `timeout` elapsed.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let (log, condvar) = &*self.inner;
        let guard = log.lock().unwrap();
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |log| log.len() < n)
            .unwrap();
        guard.len() >= n
    }
}

impl<F, S> Probe<F, S>
where
    F: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    pub fn settlements(&self) -> Vec<Settled<F, S>> {
        self.inner.0.lock().unwrap().clone()
    }

    /// The only settlement, panicking if there is not exactly one.
    pub fn single(&self) -> Settled<F, S> {
        let log = self.settlements();
        assert_eq!(log.len(), 1, "expected exactly one settlement");
        log[0].clone()
    }
}

/// A task whose forks are settled by hand.
///
/// Every fork parks its callbacks; `resolve`/`reject` settle the oldest
/// parked fork.
pub struct Trigger<F, S> {
    parked: Arc<Mutex<VecDeque<(Callback<F>, Callback<S>)>>>,
}

impl<F, S> Trigger<F, S>
where
    F: Send + 'static,
    S: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            parked: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn task(&self) -> Task<F, S> {
        let parked = self.parked.clone();
        Task::new(move |reject, resolve| {
            parked.lock().unwrap().push_back((reject, resolve));
        })
    }

    pub fn pending(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    pub fn resolve(&self, value: S) {
        let (_, resolve) = self.take();
        resolve.call(value);
    }

    pub fn reject(&self, error: F) {
        let (reject, _) = self.take();
        reject.call(error);
    }

    /// Settles the same fork a second time, simulating a broken effect.
    pub fn resolve_again(&self, value: S) {
        let slot = self.parked.lock().unwrap().front().cloned();
        let (_, resolve) = slot.expect("no parked fork");
        resolve.call(value);
    }

    fn take(&self) -> (Callback<F>, Callback<S>) {
        // The lock is released before the callback runs.
        let slot = self.parked.lock().unwrap().pop_front();
        slot.expect("no parked fork")
    }
}

/// Counts calls to a cleanup function.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wraps `task` so that its cleanup calls are counted.
pub fn tracked<F, S>(task: &Task<F, S>) -> (Task<F, S>, Counter)
where
    F: Send + 'static,
    S: Send + 'static,
{
    let counter = Counter::default();

    let inner = task.clone();
    let release = task.clone();
    let c = counter.clone();

    let tracked = Task::with_cleanup(
        move |reject, resolve| inner.fork_with(reject, resolve),
        move |handle| {
            c.hit();
            release.cleanup(handle);
        },
    );

    (tracked, counter)
}

/// A deferrer that parks jobs until the test runs them.
#[derive(Default)]
pub struct Parked(Mutex<Vec<Job>>);

impl Parked {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Runs every parked job, returning how many ran.
    pub fn run_all(&self) -> usize {
        let jobs: Vec<Job> = self.0.lock().unwrap().drain(..).collect();
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }
}

impl Defer for Parked {
    fn defer(&self, job: Job) -> Result<(), Refused> {
        self.0.lock().unwrap().push(job);
        Ok(())
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }

    condition()
}
