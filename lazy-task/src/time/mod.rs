//! Time-based tasks.
//!
//! This module provides tasks whose effects actually suspend, backed by
//! the shared timer thread.
//!
//! It includes:
//! - [`sleep`] and [`delay`] for settling after a duration,
//! - [`timeout`] for bounding another task,
//! - [`instrumented`] for measuring how long a task took to succeed.
//!
//! The handle of a sleeping fork is a [`TimerHandle`]; the task's cleanup
//! cancels the timer, which is how a lost race stops a pending sleep.

mod instrumented;
mod sleep;
mod timeout;

pub use crate::defer::timer::TimerHandle;

#[doc(inline)]
pub use instrumented::instrumented;

#[doc(inline)]
pub use sleep::{delay, sleep};

#[doc(inline)]
pub use timeout::timeout;
