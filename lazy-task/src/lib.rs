//! # lazy-task
//!
//! **lazy-task** provides [`Task`], a lazy computation that settles through
//! one of two channels (failure or success), and an algebra of combinators
//! for composing such computations without any async runtime.
//!
//! A task is only a description: nothing happens until it is forked with a
//! pair of callbacks, and every fork runs the effect again. Effects may
//! settle synchronously, later from another thread, or never.
//!
//! The crate offers:
//!
//! - **Sequencing and mapping**: `map`, `chain`, `bimap`, `rejected_map`,
//!   `swap`, `fold`, `or_else`
//! - **Independent combination**: `ap` and `both` run two tasks at once and
//!   combine their results in any completion order
//! - **Racing**: `concat` settles with whichever task settles first
//! - **Resource release**: every fork returns a [`Handle`] consumed by the
//!   task's cleanup; concurrent combinators release both sides exactly once
//!   after settlement, through a [deferral](defer) capability
//! - **Timers**: [`time::sleep`], [`time::delay`] and [`time::timeout`]
//!
//! ## Quick Start
//!
//! ```rust
//! use lazy_task::Task;
//! use std::sync::{Arc, Mutex};
//!
//! let result = Arc::new(Mutex::new(None));
//!
//! let add_one = Task::<String, _>::of(|x: i32| x + 1);
//! let out = result.clone();
//!
//! add_one
//!     .ap(&Task::of(2))
//!     .fork(|_| {}, move |x| *out.lock().unwrap() = Some(x));
//!
//! assert_eq!(*result.lock().unwrap(), Some(3));
//! ```
//!
//! ## Modules
//!
//! - [`defer`]: deferred execution backends and their selector
//! - [`time`]: timer-backed tasks
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (settlements, discarded late
//! settlements, backend fallbacks). Install any subscriber to see them.

mod error;
mod macros;
mod task;

pub mod defer;
pub mod time;

pub use error::DeferError;
pub use task::{Callback, Handle, Task, TaskFactory};
