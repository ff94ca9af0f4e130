use crate::task::Task;
use crate::time::sleep;

use std::time::Duration;

use tracing::warn;

/// Bounds `task` by `duration`.
///
/// The returned task races `task` against a timer that rejects with
/// `on_timeout`. Whichever settles first wins; if `task` wins, the timer
/// is cancelled by the race's cleanup.
///
/// If the timer thread cannot be started the bound is dropped and `task`
/// runs unbounded.
pub fn timeout<F, S>(duration: Duration, task: &Task<F, S>, on_timeout: F) -> Task<F, S>
where
    F: Clone + Send + Sync + 'static,
    S: Send + 'static,
{
    let alarm = sleep(duration)
        .or_else(|error| {
            warn!(reason = error.as_label(), "timer unavailable; timeout disabled");
            Task::<F, ()>::empty()
        })
        .chain(move |()| Task::rejected(on_timeout.clone()));

    task.concat(&alarm)
}
