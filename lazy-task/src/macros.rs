/// Races any number of tasks, left to right.
///
/// `race!(a, b, c)` expands to `a.concat(&b).concat(&c)`. Tasks are forked
/// in the order given, so among tasks settling synchronously the leftmost
/// wins.
///
/// # Examples
///
/// ```rust
/// use lazy_task::{Task, race};
/// use std::sync::{Arc, Mutex};
///
/// let winner = Arc::new(Mutex::new(None));
///
/// let w = winner.clone();
/// race!(Task::<(), i32>::empty(), Task::of(2), Task::of(3))
///     .fork(|_| {}, move |v| *w.lock().unwrap() = Some(v));
///
/// assert_eq!(*winner.lock().unwrap(), Some(2));
/// ```
#[macro_export]
macro_rules! race {
    ($first:expr $(,)?) => {{
        $first
    }};

    ($first:expr, $($rest:expr),+ $(,)?) => {{
        let race = $first;
        $(
            let race = race.concat(&$rest);
        )+
        race
    }};
}

/// Runs any number of tasks concurrently and collects their results in a
/// tuple, in argument order.
///
/// Built on [`Task::both`](crate::Task::both): the first failure wins and
/// every other settlement is discarded.
///
/// # Examples
///
/// ```rust
/// use lazy_task::{Task, join};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(None));
///
/// let s = seen.clone();
/// join!(Task::<(), _>::of(1), Task::of("two"), Task::of(3.0))
///     .fork(|_| {}, move |v| *s.lock().unwrap() = Some(v));
///
/// assert_eq!(*seen.lock().unwrap(), Some((1, "two", 3.0)));
/// ```
#[macro_export]
macro_rules! join {
    ($a:expr $(,)?) => {{
        $a
    }};

    ($a:expr, $b:expr $(,)?) => {{
        $a.both(&$b)
    }};

    ($a:expr, $b:expr, $c:expr $(,)?) => {{
        $a.both(&$b)
            .both(&$c)
            .map(|((a, b), c)| (a, b, c))
    }};

    ($a:expr, $b:expr, $c:expr, $d:expr $(,)?) => {{
        $a.both(&$b)
            .both(&$c)
            .both(&$d)
            .map(|(((a, b), c), d)| (a, b, c, d))
    }};
}
