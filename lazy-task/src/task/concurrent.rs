//! Combinators that drive two tasks at once.
//!
//! Both inner tasks are forked unconditionally, the receiver first. A
//! [`Guard`] created per fork decides which settlement reaches the outer
//! callbacks and releases both inner handles once, after the winning
//! callback has returned, through the receiver's deferrer. That holds
//! even when the winner settles on another thread while the fork is
//! still running.
//!
//! The composite fork returns a handle wrapping that guard. Passing it to
//! the composite's [`cleanup`](Task::cleanup) releases the inner handles
//! unless the guard already did.

use super::Callback;
use super::core::{CleanupFn, Task};
use super::guard::Guard;

use std::sync::{Arc, Mutex, PoisonError};

/// Values collected by `ap` until both sides succeeded.
struct Pair<G, A> {
    func: Option<G>,
    arg: Option<A>,
}

impl<G, A> Pair<G, A> {
    /// Returns both values once the second one arrives.
    fn complete(&mut self) -> Option<(G, A)> {
        if self.func.is_some() && self.arg.is_some() {
            self.func.take().zip(self.arg.take())
        } else {
            None
        }
    }
}

fn composite_cleanup() -> CleanupFn {
    Arc::new(Guard::release_handle)
}

impl<F, G> Task<F, G>
where
    F: Send + 'static,
    G: Send + 'static,
{
    /// Applies the function this task succeeds with to the value `arg`
    /// succeeds with.
    ///
    /// Both tasks run concurrently. The result resolves once both
    /// succeeded, whichever finished first, and rejects with the first
    /// failure from either side. Anything arriving after settlement is
    /// discarded.
    pub fn ap<A, B>(&self, arg: &Task<F, A>) -> Task<F, B>
    where
        A: Send + 'static,
        B: Send + 'static,
        G: FnOnce(A) -> B,
    {
        let func_fork = self.fork.clone();
        let arg_fork = arg.fork.clone();
        let func_cleanup = self.cleanup.clone();
        let arg_cleanup = arg.cleanup.clone();
        let deferrer = self.deferrer.clone();

        let fork = move |reject: Callback<F>, resolve: Callback<B>| {
            let guard = Guard::new(func_cleanup.clone(), arg_cleanup.clone(), deferrer.clone());
            let pair = Arc::new(Mutex::new(Pair::<G, A> {
                func: None,
                arg: None,
            }));

            let reject = guard.gate(reject);

            let on_func = {
                let (guard, pair, resolve) = (guard.clone(), pair.clone(), resolve.clone());

                Callback::new(move |func: G| {
                    if guard.is_settled() {
                        return;
                    }

                    let ready = {
                        let mut pair = pair.lock().unwrap_or_else(PoisonError::into_inner);
                        pair.func = Some(func);
                        pair.complete()
                    };

                    if let Some((func, arg)) = ready {
                        guard.settle(|| resolve.call(func(arg)));
                    }
                })
            };

            let on_arg = {
                let (guard, pair) = (guard.clone(), pair.clone());

                Callback::new(move |arg: A| {
                    if guard.is_settled() {
                        return;
                    }

                    let ready = {
                        let mut pair = pair.lock().unwrap_or_else(PoisonError::into_inner);
                        pair.arg = Some(arg);
                        pair.complete()
                    };

                    if let Some((func, arg)) = ready {
                        guard.settle(|| resolve.call(func(arg)));
                    }
                })
            };

            let func_handle = func_fork(reject.clone(), on_func);
            let arg_handle = arg_fork(reject, on_arg);

            guard.arm(func_handle, arg_handle);
            guard.handle()
        };

        Task::assemble(Arc::new(fork), composite_cleanup(), self.deferrer.clone())
    }
}

impl<F, S> Task<F, S>
where
    F: Send + 'static,
    S: Send + 'static,
{
    /// Races this task against `other`.
    ///
    /// The first settlement on either channel, from either task, settles
    /// the result with the same channel and value. The loser keeps
    /// running; its settlement is discarded and its cleanup still runs.
    ///
    /// This task is forked first, so when both settle synchronously this
    /// task wins. Beyond that, ties go to whichever callback the effects
    /// happen to invoke first.
    ///
    /// `concat` is associative and [`Task::empty`] is its identity.
    pub fn concat(&self, other: &Task<F, S>) -> Task<F, S> {
        let first_fork = self.fork.clone();
        let second_fork = other.fork.clone();
        let first_cleanup = self.cleanup.clone();
        let second_cleanup = other.cleanup.clone();
        let deferrer = self.deferrer.clone();

        let fork = move |reject: Callback<F>, resolve: Callback<S>| {
            let guard = Guard::new(first_cleanup.clone(), second_cleanup.clone(), deferrer.clone());

            let reject = guard.gate(reject);
            let resolve = guard.gate(resolve);

            let first = first_fork(reject.clone(), resolve.clone());
            let second = second_fork(reject, resolve);

            guard.arm(first, second);
            guard.handle()
        };

        Task::assemble(Arc::new(fork), composite_cleanup(), self.deferrer.clone())
    }

    /// Runs this task and `other` concurrently and pairs their results.
    ///
    /// Built on [`ap`](Self::ap): same failure and cleanup semantics.
    pub fn both<T>(&self, other: &Task<F, T>) -> Task<F, (S, T)>
    where
        T: Send + 'static,
    {
        self.map(|left| move |right: T| (left, right)).ap(other)
    }
}
