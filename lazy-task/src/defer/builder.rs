use super::{Auto, Backend};

use std::time::Duration;

/// Builder for configuring the automatic deferral selector.
///
/// `DeferBuilder` decides which backends [`Auto`] may use and in which
/// order, and how long the timer backend waits before running a job.
///
/// # Examples
///
/// ```rust
/// use lazy_task::defer::{Backend, DeferBuilder};
/// use std::time::Duration;
///
/// let auto = DeferBuilder::new()
///     .order([Backend::Worker, Backend::Timer])
///     .timer_delay(Duration::from_millis(1))
///     .build();
///
/// assert_eq!(auto.order(), &[Backend::Worker, Backend::Timer]);
/// ```
pub struct DeferBuilder {
    /// Backends in preference order.
    order: Vec<Backend>,

    /// Delay used by the timer backend.
    timer_delay: Duration,
}

impl DeferBuilder {
    /// Creates a builder with the default configuration.
    ///
    /// By default every backend is enabled, in
    /// [`Backend::FALLBACK_ORDER`], and the timer delay is zero.
    pub fn new() -> Self {
        Self {
            order: Backend::FALLBACK_ORDER.to_vec(),
            timer_delay: Duration::ZERO,
        }
    }

    /// Sets the backends to try, in order. Duplicates are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `order` is empty.
    pub fn order(mut self, order: impl IntoIterator<Item = Backend>) -> Self {
        let mut backends = Vec::new();
        for backend in order {
            if !backends.contains(&backend) {
                backends.push(backend);
            }
        }

        assert!(!backends.is_empty(), "deferral order must name at least one backend");

        self.order = backends;
        self
    }

    /// Sets how long the timer backend waits before running a job.
    pub fn timer_delay(mut self, delay: Duration) -> Self {
        self.timer_delay = delay;
        self
    }

    /// Builds the selector.
    pub fn build(self) -> Auto {
        Auto::new(self.order, self.timer_delay)
    }
}

impl Default for DeferBuilder {
    fn default() -> Self {
        Self::new()
    }
}
