//! Deferred execution.
//!
//! Combinators that drive two tasks at once never release resources from
//! inside the callback that settled them. They hand a [`Job`] to a
//! [`Defer`] implementation instead, which runs it "soon but not now".
//!
//! Three backends exist, listed in the order [`Auto`] tries them:
//!
//! 1. [`Backend::Microtask`]: a per-thread queue drained as soon as the
//!    outermost [`Task::fork`](crate::Task::fork) on that thread returns.
//!    Only available while a fork is running on the current thread.
//! 2. [`Backend::Worker`]: a background thread consuming jobs in FIFO
//!    order.
//! 3. [`Backend::Timer`]: the timer thread, running the job once a
//!    configurable delay has elapsed.
//!
//! The selection happens for every job, so a settlement arriving on a
//! foreign thread transparently falls through to the worker.

mod builder;
mod worker;

pub(crate) mod microtask;
pub(crate) mod timer;

pub use builder::DeferBuilder;

use crate::error::DeferError;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a deferral capability.
pub type Deferrer = Arc<dyn Defer>;

/// A capability to run a job after the current synchronous execution.
pub trait Defer: Send + Sync {
    /// Schedules `job`.
    ///
    /// On failure the job is handed back inside [`Refused`] so the caller
    /// can try somewhere else.
    fn defer(&self, job: Job) -> Result<(), Refused>;
}

/// A job a backend could not accept, together with the reason.
pub struct Refused {
    /// The job, untouched.
    pub job: Job,
    /// Why the backend refused it.
    pub error: DeferError,
}

impl fmt::Debug for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refused")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// The scheduling primitives a job can be deferred onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Per-thread queue drained when the outermost fork returns.
    Microtask,
    /// Dedicated background thread, FIFO.
    Worker,
    /// Timer thread, after a delay.
    Timer,
}

impl Backend {
    /// Default fallback order: fastest primitive first.
    pub const FALLBACK_ORDER: [Backend; 3] = [Backend::Microtask, Backend::Worker, Backend::Timer];

    /// Returns a short stable label for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Backend::Microtask => "microtask",
            Backend::Worker => "worker",
            Backend::Timer => "timer",
        }
    }

    /// Defers `job` on this backend. `delay` only applies to
    /// [`Backend::Timer`].
    pub(crate) fn defer_after(self, job: Job, delay: Duration) -> Result<(), Refused> {
        match self {
            Backend::Microtask => microtask::push(job),
            Backend::Worker => worker::push(job),
            Backend::Timer => match timer::shared() {
                Ok(timer) => {
                    timer.schedule(Instant::now() + delay, job);
                    Ok(())
                }
                Err(error) => Err(Refused { job, error }),
            },
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl Defer for Backend {
    /// Pins every job to this single backend, with no fallback.
    fn defer(&self, job: Job) -> Result<(), Refused> {
        self.defer_after(job, Duration::ZERO)
    }
}

/// The automatic selector.
///
/// Tries each configured backend in order and uses the first one that
/// accepts the job. If every backend refuses, the job runs inline on the
/// current thread: a dropped cleanup job would leak whatever resource it
/// was meant to release.
#[derive(Debug, Clone)]
pub struct Auto {
    /// Backends in preference order.
    order: Vec<Backend>,

    /// Delay applied when the timer backend is used.
    timer_delay: Duration,
}

impl Auto {
    pub(crate) fn new(order: Vec<Backend>, timer_delay: Duration) -> Self {
        Self { order, timer_delay }
    }

    /// Backends in the order they are tried.
    pub fn order(&self) -> &[Backend] {
        &self.order
    }

    /// Delay used by the timer backend.
    pub fn timer_delay(&self) -> Duration {
        self.timer_delay
    }
}

impl Default for Auto {
    fn default() -> Self {
        Self::new(Backend::FALLBACK_ORDER.to_vec(), Duration::ZERO)
    }
}

impl Defer for Auto {
    fn defer(&self, job: Job) -> Result<(), Refused> {
        let mut job = job;

        for backend in &self.order {
            match backend.defer_after(job, self.timer_delay) {
                Ok(()) => {
                    trace!(%backend, "job deferred");
                    return Ok(());
                }
                Err(refused) => {
                    debug!(%backend, reason = refused.error.as_label(), "backend refused job");
                    job = refused.job;
                }
            }
        }

        warn!("no deferral backend accepted the job; running it inline");
        job();

        Ok(())
    }
}

/// Returns the deferrer tasks use unless configured otherwise.
///
/// This is an [`Auto`] selector with the default fallback order.
pub fn default_deferrer() -> Deferrer {
    static DEFAULT: OnceLock<Deferrer> = OnceLock::new();

    DEFAULT.get_or_init(|| Arc::new(Auto::default())).clone()
}

/// Runs a job on a background thread.
///
/// The job executes inside a microtask scope so that whatever it defers
/// runs right after it, and a panic is contained to this job.
pub(crate) fn run_isolated(job: Job) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| microtask::enter(job)));

    if outcome.is_err() {
        error!("deferred job panicked");
    }
}
