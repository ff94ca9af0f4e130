use super::{Backend, Job, Refused, run_isolated};
use crate::error::DeferError;

use std::sync::mpsc::{Receiver, SendError, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::debug;

/// The shared worker, started on first use.
static SHARED: Mutex<Option<Arc<WorkerQueue>>> = Mutex::new(None);

/// A background thread running deferred jobs one after another.
pub(crate) struct WorkerQueue {
    /// Sending half of the job channel.
    sender: Sender<Job>,
}

impl WorkerQueue {
    /// Spawns the worker thread.
    fn start() -> Result<Self, DeferError> {
        let (sender, receiver) = channel();

        thread::Builder::new()
            .name("lazy-task-worker".into())
            .spawn(move || run(receiver))
            .map_err(|source| DeferError::Spawn {
                backend: Backend::Worker,
                source,
            })?;

        debug!("worker thread started");

        Ok(Self { sender })
    }

    fn push(&self, job: Job) -> Result<(), Refused> {
        self.sender.send(job).map_err(|SendError(job)| Refused {
            job,
            error: DeferError::Closed {
                backend: Backend::Worker,
            },
        })
    }
}

fn run(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        run_isolated(job);
    }
}

/// Queues `job` on the shared worker, starting it if needed.
///
/// A worker whose channel turns out closed is forgotten so the next call
/// starts a fresh one.
pub(crate) fn push(job: Job) -> Result<(), Refused> {
    let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);

    let queue = match slot.as_ref() {
        Some(queue) => queue.clone(),
        None => match WorkerQueue::start() {
            Ok(queue) => slot.insert(Arc::new(queue)).clone(),
            Err(error) => return Err(Refused { job, error }),
        },
    };

    let pushed = queue.push(job);
    if pushed.is_err() {
        *slot = None;
    }

    pushed
}
