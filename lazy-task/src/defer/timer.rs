use super::{Backend, Job, run_isolated};
use crate::error::DeferError;

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Instant;

use tracing::{debug, trace};

/// The shared timer, started on first use.
static SHARED: Mutex<Option<Arc<TimerQueue>>> = Mutex::new(None);

/// What a scheduled timer and its [`TimerHandle`] share.
///
/// The job sits behind its own lock so that cancelling drops it, and
/// everything it captured, right away instead of at the deadline.
struct Slot {
    cancelled: AtomicBool,
    job: Mutex<Option<Job>>,
}

impl Slot {
    fn take_job(&self) -> Option<Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// An entry in the timer queue.
///
/// Entries are stored in a binary heap ordered by deadline. Entries
/// sharing a deadline fire in the order they were scheduled.
pub(crate) struct TimerEntry {
    /// The time at which the job should run.
    deadline: Instant,

    /// Insertion counter, used as a tie-break.
    seq: u64,

    /// The job and its cancellation flag.
    slot: Arc<Slot>,
}

impl TimerEntry {
    fn is_cancelled(&self) -> bool {
        self.slot.cancelled.load(Ordering::Acquire)
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// A handle to a scheduled timer.
///
/// Cancelling is idempotent and has no effect once the timer fired. A
/// cancelled timer's job is dropped immediately.
#[derive(Clone)]
pub struct TimerHandle {
    slot: Arc<Slot>,
    queue: Weak<TimerQueue>,
}

impl TimerHandle {
    /// Prevents the timer's job from running.
    pub fn cancel(&self) {
        self.slot.cancelled.store(true, Ordering::Release);

        // Dropped outside the slot lock: the job may own arbitrary state.
        let Some(job) = self.slot.take_job() else {
            return;
        };
        drop(job);

        if let Some(queue) = self.queue.upgrade() {
            queue.note_cancelled();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.slot.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct State {
    timers: BinaryHeap<TimerEntry>,
    next_seq: u64,

    /// Cancelled entries believed to still sit in `timers`. Approximate:
    /// it only decides when to purge.
    cancelled: usize,
}

/// A thread that runs jobs once their deadline is reached.
pub(crate) struct TimerQueue {
    state: Mutex<State>,
    condvar: Condvar,
}

impl TimerQueue {
    /// Creates the queue and spawns its thread.
    fn start() -> Result<Arc<Self>, DeferError> {
        let queue = Arc::new(Self {
            state: Mutex::new(State {
                timers: BinaryHeap::new(),
                next_seq: 0,
                cancelled: 0,
            }),
            condvar: Condvar::new(),
        });

        let runner = queue.clone();
        thread::Builder::new()
            .name("lazy-task-timer".into())
            .spawn(move || runner.run())
            .map_err(|source| DeferError::Spawn {
                backend: Backend::Timer,
                source,
            })?;

        debug!("timer thread started");

        Ok(queue)
    }

    /// Schedules `job` to run at `deadline`.
    pub(crate) fn schedule(self: &Arc<Self>, deadline: Instant, job: Job) -> TimerHandle {
        let slot = Arc::new(Slot {
            cancelled: AtomicBool::new(false),
            job: Mutex::new(Some(job)),
        });

        {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;

            state.timers.push(TimerEntry {
                deadline,
                seq,
                slot: slot.clone(),
            });
        }

        self.condvar.notify_one();

        TimerHandle {
            slot,
            queue: Arc::downgrade(self),
        }
    }

    /// Records a cancellation and purges cancelled entries once they make
    /// up more than half of the heap.
    fn note_cancelled(&self) {
        let mut state = self.lock();
        state.cancelled += 1;

        if state.cancelled * 2 > state.timers.len() {
            let before = state.timers.len();
            state.timers.retain(|entry| !entry.is_cancelled());
            state.cancelled = 0;

            trace!(purged = before - state.timers.len(), "cancelled timers purged");
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self) {
        let mut state = self.lock();

        loop {
            let now = Instant::now();

            state = match state.timers.peek().map(|entry| entry.deadline) {
                None => self
                    .condvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),

                Some(deadline) if deadline > now => {
                    match self.condvar.wait_timeout(state, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }

                Some(_) => {
                    let due = state.timers.pop();
                    if due.as_ref().is_some_and(TimerEntry::is_cancelled) {
                        state.cancelled = state.cancelled.saturating_sub(1);
                    }
                    drop(state);

                    if let Some(job) = due.and_then(|entry| entry.slot.take_job()) {
                        run_isolated(job);
                    }

                    self.lock()
                }
            };
        }
    }
}

/// Returns the shared timer, starting it if needed.
pub(crate) fn shared() -> Result<Arc<TimerQueue>, DeferError> {
    let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(queue) = slot.as_ref() {
        return Ok(queue.clone());
    }

    let queue = TimerQueue::start()?;
    *slot = Some(queue.clone());

    Ok(queue)
}
