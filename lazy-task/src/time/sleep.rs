use crate::defer::timer::{self, TimerHandle};
use crate::error::DeferError;
use crate::task::{Callback, Handle, Task};

use std::time::{Duration, Instant};

/// Creates a task that resolves once `duration` has elapsed.
///
/// The deadline is computed when the task is forked, not when it is
/// created, so every fork sleeps for the full duration. The fork returns
/// a [`TimerHandle`] and the task's cleanup cancels it.
///
/// Rejects with [`DeferError`] if the timer thread cannot be started.
///
/// # Examples
///
/// ```rust
/// use lazy_task::time::sleep;
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// let (tx, rx) = mpsc::channel();
/// let tx = std::sync::Mutex::new(tx);
///
/// sleep(Duration::from_millis(10)).fork(|_| {}, move |()| {
///     let _ = tx.lock().unwrap().send("woke");
/// });
///
/// assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok("woke"));
/// ```
pub fn sleep(duration: Duration) -> Task<DeferError, ()> {
    Task::with_cleanup(
        move |reject: Callback<DeferError>, resolve: Callback<()>| match timer::shared() {
            Ok(timer) => {
                let deadline = Instant::now() + duration;
                Handle::new(timer.schedule(deadline, Box::new(move || resolve.call(()))))
            }
            Err(error) => {
                reject.call(error);
                Handle::none()
            }
        },
        cancel,
    )
}

/// Creates a task that resolves with `value` once `duration` has elapsed.
pub fn delay<S>(duration: Duration, value: S) -> Task<DeferError, S>
where
    S: Clone + Send + Sync + 'static,
{
    sleep(duration).map(move |()| value.clone())
}

fn cancel(handle: Handle) {
    if let Some(timer) = handle.downcast_ref::<TimerHandle>() {
        timer.cancel();
    }
}
