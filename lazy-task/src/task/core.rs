use super::callback::{Callback, Handle};
use crate::defer::{Deferrer, default_deferrer, microtask};

use std::fmt;
use std::sync::Arc;

/// Type-erased fork function.
pub(crate) type ForkFn<F, S> = Arc<dyn Fn(Callback<F>, Callback<S>) -> Handle + Send + Sync>;

/// Type-erased cleanup function.
pub(crate) type CleanupFn = Arc<dyn Fn(Handle) + Send + Sync>;

/// A lazy computation that either fails with an `F` or succeeds with an `S`.
///
/// A `Task` is a description. Nothing runs until [`fork`](Self::fork) is
/// called, and every call runs the underlying effect again from scratch:
/// results are never memoized.
///
/// The effect must settle through at most one of its two callbacks. It
/// may settle synchronously, later from another thread, or never.
///
/// A panic raised by a fork function is not caught; it unwinds out of
/// `fork` to the caller. Effects report failure through the reject
/// channel instead.
///
/// # Examples
///
/// ```rust
/// use lazy_task::Task;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(None));
///
/// let out = seen.clone();
/// Task::<String, i32>::of(2)
///     .chain(|x| Task::of(x + 1))
///     .fork(|_| {}, move |x| *out.lock().unwrap() = Some(x));
///
/// assert_eq!(*seen.lock().unwrap(), Some(3));
/// ```
pub struct Task<F, S> {
    /// The effect.
    pub(crate) fork: ForkFn<F, S>,

    /// Releases whatever a fork returned.
    pub(crate) cleanup: CleanupFn,

    /// Where combinators send their deferred cleanup.
    pub(crate) deferrer: Deferrer,
}

impl<F, S> Task<F, S>
where
    F: Send + 'static,
    S: Send + 'static,
{
    /// Creates a task from a fork function, with a no-op cleanup.
    ///
    /// The fork function may return `()` or any [`Handle`].
    pub fn new<K, H>(fork: K) -> Self
    where
        K: Fn(Callback<F>, Callback<S>) -> H + Send + Sync + 'static,
        H: Into<Handle>,
    {
        Self::with_cleanup(fork, |_| {})
    }

    /// Creates a task from a fork function and the cleanup function that
    /// releases what the fork returns.
    pub fn with_cleanup<K, H, C>(fork: K, cleanup: C) -> Self
    where
        K: Fn(Callback<F>, Callback<S>) -> H + Send + Sync + 'static,
        H: Into<Handle>,
        C: Fn(Handle) + Send + Sync + 'static,
    {
        let erased: ForkFn<F, S> =
            Arc::new(move |reject: Callback<F>, resolve: Callback<S>| -> Handle {
                fork(reject, resolve).into()
            });

        Self::assemble(erased, Arc::new(cleanup), default_deferrer())
    }

    pub(crate) fn assemble(fork: ForkFn<F, S>, cleanup: CleanupFn, deferrer: Deferrer) -> Self {
        Self {
            fork,
            cleanup,
            deferrer,
        }
    }

    /// A task that resolves with `value` as soon as it is forked.
    pub fn of(value: S) -> Self
    where
        S: Clone + Sync,
    {
        TaskFactory::default().of(value)
    }

    /// A task that rejects with `value` as soon as it is forked.
    pub fn rejected(value: F) -> Self
    where
        F: Clone + Sync,
    {
        TaskFactory::default().rejected(value)
    }

    /// A task that never settles.
    ///
    /// This is the identity of [`concat`](Self::concat).
    pub fn empty() -> Self {
        TaskFactory::default().empty()
    }

    /// Returns the constructors bound to this task's configuration.
    ///
    /// Tasks built through the factory share this task's deferrer.
    pub fn factory(&self) -> TaskFactory {
        TaskFactory {
            deferrer: self.deferrer.clone(),
        }
    }

    /// Replaces the deferrer used by combinators built on this task.
    pub fn with_deferrer(mut self, deferrer: Deferrer) -> Self {
        self.deferrer = deferrer;
        self
    }

    /// The deferrer used by combinators built on this task.
    pub fn deferrer(&self) -> &Deferrer {
        &self.deferrer
    }

    /// Runs the effect.
    ///
    /// Returns the handle produced by the effect, to be passed to
    /// [`cleanup`](Self::cleanup) once the task settled.
    pub fn fork<R, V>(&self, reject: R, resolve: V) -> Handle
    where
        R: Fn(F) + Send + Sync + 'static,
        V: Fn(S) + Send + Sync + 'static,
    {
        self.fork_with(Callback::new(reject), Callback::new(resolve))
    }

    /// Runs the effect with already wrapped callbacks.
    ///
    /// Jobs deferred on the microtask queue while the effect runs
    /// synchronously are drained before the outermost fork on this thread
    /// returns.
    pub fn fork_with(&self, reject: Callback<F>, resolve: Callback<S>) -> Handle {
        microtask::enter(|| (self.fork)(reject, resolve))
    }

    /// Releases the resources held by a fork.
    pub fn cleanup(&self, handle: Handle) {
        (self.cleanup)(handle)
    }

    /// Builds a task driving this one, keeping its cleanup and deferrer.
    pub(crate) fn derive<E, T, K>(&self, fork: K) -> Task<E, T>
    where
        K: Fn(Callback<E>, Callback<T>) -> Handle + Send + Sync + 'static,
    {
        Task {
            fork: Arc::new(fork),
            cleanup: self.cleanup.clone(),
            deferrer: self.deferrer.clone(),
        }
    }
}

impl<F, S> Clone for Task<F, S> {
    fn clone(&self) -> Self {
        Self {
            fork: self.fork.clone(),
            cleanup: self.cleanup.clone(),
            deferrer: self.deferrer.clone(),
        }
    }
}

impl<F, S> fmt::Debug for Task<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task")
    }
}

/// Constructors bound to a deferrer.
///
/// Obtained from [`Task::factory`], so code holding a task can create
/// fresh ones with the same configuration without naming it.
#[derive(Clone)]
pub struct TaskFactory {
    deferrer: Deferrer,
}

impl TaskFactory {
    /// Creates a factory producing tasks that use `deferrer`.
    pub fn new(deferrer: Deferrer) -> Self {
        Self { deferrer }
    }

    /// A task that resolves with `value` as soon as it is forked.
    pub fn of<F, S>(&self, value: S) -> Task<F, S>
    where
        F: Send + 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.task(move |_, resolve| {
            resolve.call(value.clone());
            Handle::none()
        })
    }

    /// A task that rejects with `value` as soon as it is forked.
    pub fn rejected<F, S>(&self, value: F) -> Task<F, S>
    where
        F: Clone + Send + Sync + 'static,
        S: Send + 'static,
    {
        self.task(move |reject, _| {
            reject.call(value.clone());
            Handle::none()
        })
    }

    /// A task that never settles.
    pub fn empty<F, S>(&self) -> Task<F, S>
    where
        F: Send + 'static,
        S: Send + 'static,
    {
        self.task(|_, _| Handle::none())
    }

    /// The base constructor, with this factory's deferrer.
    pub fn task<F, S, K>(&self, fork: K) -> Task<F, S>
    where
        F: Send + 'static,
        S: Send + 'static,
        K: Fn(Callback<F>, Callback<S>) -> Handle + Send + Sync + 'static,
    {
        Task::assemble(Arc::new(fork), Arc::new(|_: Handle| {}), self.deferrer.clone())
    }
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new(default_deferrer())
    }
}

impl fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskFactory")
    }
}
