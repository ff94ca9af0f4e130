use crate::task::{Callback, Task};

use std::time::{Duration, Instant};

/// Wraps a task and measures how long it takes to succeed.
///
/// The returned task resolves with a tuple containing:
/// - the success value of the wrapped task,
/// - the elapsed time since the fork started.
///
/// Timing starts on **every fork**, not at construction time. Failures
/// pass through unmeasured.
///
/// # Examples
///
/// ```rust
/// use lazy_task::Task;
/// use lazy_task::time::instrumented;
///
/// instrumented(&Task::<(), i32>::of(42)).fork(|_| {}, |(value, elapsed)| {
///     assert_eq!(value, 42);
///     println!("completed in {elapsed:?}");
/// });
/// ```
pub fn instrumented<F, S>(task: &Task<F, S>) -> Task<F, (S, Duration)>
where
    F: Send + 'static,
    S: Send + 'static,
{
    let fork = task.fork.clone();

    task.derive(move |reject, resolve: Callback<(S, Duration)>| {
        let start = Instant::now();
        fork(reject, Callback::new(move |value| resolve.call((value, start.elapsed()))))
    })
}
