//! Lazy dual-channel tasks.
//!
//! This module defines [`Task`], the callbacks it settles through, the
//! opaque [`Handle`] its effect returns, and the combinators built on top:
//!
//! - sequential ones (`map`, `chain`, `bimap`, `rejected_map`, `swap`,
//!   `fold`, `or_else`) driving one task and at most one follow-up,
//! - concurrent ones (`ap`, `both`, `concat`) driving two tasks at once
//!   behind a per-fork settlement guard.

mod callback;
mod combinators;
mod concurrent;
mod core;
mod guard;

pub use callback::{Callback, Handle};
pub use core::{Task, TaskFactory};
