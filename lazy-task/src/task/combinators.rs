//! Combinators that drive a single task, then at most one follow-up task
//! obtained from its result.
//!
//! They keep the source task's cleanup: the handle of a follow-up task
//! created by [`chain`](Task::chain) or [`or_else`](Task::or_else) stays
//! private to that follow-up.

use super::Callback;
use super::core::Task;

use std::convert::Infallible;
use std::sync::Arc;

impl<F, S> Task<F, S>
where
    F: Send + 'static,
    S: Send + 'static,
{
    /// Transforms the success value. Failures pass through unchanged.
    pub fn map<T, M>(&self, f: M) -> Task<F, T>
    where
        T: Send + 'static,
        M: Fn(S) -> T + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);

        self.derive(move |reject, resolve: Callback<T>| {
            let f = f.clone();
            fork(reject, Callback::new(move |value| resolve.call(f(value))))
        })
    }

    /// Sequences a second task built from the success value.
    ///
    /// The follow-up task is forked with the outer callbacks. Failures of
    /// this task short-circuit without calling `f`.
    pub fn chain<T, C>(&self, f: C) -> Task<F, T>
    where
        T: Send + 'static,
        C: Fn(S) -> Task<F, T> + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);

        self.derive(move |reject: Callback<F>, resolve: Callback<T>| {
            let f = f.clone();
            let next_reject = reject.clone();

            fork(
                reject,
                Callback::new(move |value| {
                    (f(value).fork)(next_reject.clone(), resolve.clone());
                }),
            )
        })
    }

    /// Transforms both channels: `f` the failure, `g` the success.
    pub fn bimap<E, T, M, N>(&self, f: M, g: N) -> Task<E, T>
    where
        E: Send + 'static,
        T: Send + 'static,
        M: Fn(F) -> E + Send + Sync + 'static,
        N: Fn(S) -> T + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);
        let g = Arc::new(g);

        self.derive(move |reject: Callback<E>, resolve: Callback<T>| {
            let f = f.clone();
            let g = g.clone();

            fork(
                Callback::new(move |error| reject.call(f(error))),
                Callback::new(move |value| resolve.call(g(value))),
            )
        })
    }

    /// Transforms the failure value. Successes pass through unchanged.
    pub fn rejected_map<E, M>(&self, f: M) -> Task<E, S>
    where
        E: Send + 'static,
        M: Fn(F) -> E + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);

        self.derive(move |reject: Callback<E>, resolve| {
            let f = f.clone();
            fork(Callback::new(move |error| reject.call(f(error))), resolve)
        })
    }

    /// Exchanges the channels: a failure becomes a success carrying the
    /// same value, and the other way round.
    pub fn swap(&self) -> Task<S, F> {
        let fork = self.fork.clone();

        self.derive(move |reject: Callback<S>, resolve: Callback<F>| fork(resolve, reject))
    }

    /// Eliminates the failure channel.
    ///
    /// The returned task always resolves: with `f(error)` if this task
    /// fails, with `g(value)` if it succeeds.
    pub fn fold<T, M, N>(&self, f: M, g: N) -> Task<Infallible, T>
    where
        T: Send + 'static,
        M: Fn(F) -> T + Send + Sync + 'static,
        N: Fn(S) -> T + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);
        let g = Arc::new(g);

        self.derive(move |_: Callback<Infallible>, resolve: Callback<T>| {
            let f = f.clone();
            let g = g.clone();
            let on_error = resolve.clone();

            fork(
                Callback::new(move |error| on_error.call(f(error))),
                Callback::new(move |value| resolve.call(g(value))),
            )
        })
    }

    /// Recovers from a failure with a second task built from it.
    ///
    /// This is the mirror of [`chain`](Self::chain): successes pass
    /// through, failures are handed to `f` and the recovery task is forked
    /// with the outer callbacks.
    pub fn or_else<E, C>(&self, f: C) -> Task<E, S>
    where
        E: Send + 'static,
        C: Fn(F) -> Task<E, S> + Send + Sync + 'static,
    {
        let fork = self.fork.clone();
        let f = Arc::new(f);

        self.derive(move |reject: Callback<E>, resolve: Callback<S>| {
            let f = f.clone();
            let next_resolve = resolve.clone();

            fork(
                Callback::new(move |error| {
                    (f(error).fork)(reject.clone(), next_resolve.clone());
                }),
                resolve,
            )
        })
    }
}
