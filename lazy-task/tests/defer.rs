mod common;

use common::*;
use lazy_task::defer::{Auto, Backend, Defer, DeferBuilder, default_deferrer};
use lazy_task::{DeferError, Task};

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const PATIENCE: Duration = Duration::from_secs(2);

fn current_thread_name() -> Option<String> {
    thread::current().name().map(String::from)
}

#[test]
fn test_microtask_refused_outside_fork() {
    let refused = Backend::Microtask.defer(Box::new(|| {})).unwrap_err();

    assert!(matches!(refused.error, DeferError::NoActiveFork));
    assert_eq!(refused.error.as_label(), "defer_no_active_fork");
}

#[test]
fn test_microtask_runs_before_fork_returns() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    let task = Task::<(), ()>::new(move |_, resolve| {
        let deferred = l.clone();
        Backend::Microtask
            .defer(Box::new(move || deferred.lock().unwrap().push("deferred")))
            .unwrap();

        l.lock().unwrap().push("body");
        resolve.call(());
    });

    let l = log.clone();
    task.fork(|_| {}, move |()| l.lock().unwrap().push("settled"));
    log.lock().unwrap().push("returned");

    assert_eq!(
        *log.lock().unwrap(),
        vec!["body", "settled", "deferred", "returned"]
    );
}

#[test]
fn test_worker_runs_on_background_thread() {
    init_logging();

    let (tx, rx) = mpsc::channel();
    Backend::Worker
        .defer(Box::new(move || {
            let _ = tx.send(current_thread_name());
        }))
        .unwrap();

    let name = rx.recv_timeout(PATIENCE).unwrap();
    assert_eq!(name.as_deref(), Some("lazy-task-worker"));
}

#[test]
fn test_worker_is_fifo() {
    let (tx, rx) = mpsc::channel();

    for i in 0..10 {
        let tx = tx.clone();
        Backend::Worker
            .defer(Box::new(move || {
                let _ = tx.send(i);
            }))
            .unwrap();
    }

    let received: Vec<i32> = (0..10).map(|_| rx.recv_timeout(PATIENCE).unwrap()).collect();
    assert_eq!(received, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_worker_survives_a_panicking_job() {
    init_logging();

    Backend::Worker
        .defer(Box::new(|| panic!("job failed")))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    Backend::Worker
        .defer(Box::new(move || {
            let _ = tx.send("still alive");
        }))
        .unwrap();

    assert_eq!(rx.recv_timeout(PATIENCE), Ok("still alive"));
}

#[test]
fn test_timer_runs_on_timer_thread() {
    let (tx, rx) = mpsc::channel();
    Backend::Timer
        .defer(Box::new(move || {
            let _ = tx.send(current_thread_name());
        }))
        .unwrap();

    let name = rx.recv_timeout(PATIENCE).unwrap();
    assert_eq!(name.as_deref(), Some("lazy-task-timer"));
}

#[test]
fn test_auto_prefers_microtask_inside_fork() {
    let ran_on = Arc::new(Mutex::new(None));

    let r = ran_on.clone();
    let task = Task::<(), ()>::new(move |_, _| {
        let r = r.clone();
        Auto::default()
            .defer(Box::new(move || *r.lock().unwrap() = Some(thread::current().id())))
            .unwrap();
    });
    task.fork(|_| {}, |_| {});

    assert_eq!(*ran_on.lock().unwrap(), Some(thread::current().id()));
}

#[test]
fn test_auto_falls_back_to_worker_outside_fork() {
    let (tx, rx) = mpsc::channel();

    default_deferrer()
        .defer(Box::new(move || {
            let _ = tx.send(current_thread_name());
        }))
        .unwrap();

    let name = rx.recv_timeout(PATIENCE).unwrap();
    assert_eq!(name.as_deref(), Some("lazy-task-worker"));
}

#[test]
fn test_auto_runs_inline_when_every_backend_refuses() {
    init_logging();

    let auto = DeferBuilder::new().order([Backend::Microtask]).build();

    let ran = Arc::new(Mutex::new(false));
    let r = ran.clone();
    auto.defer(Box::new(move || *r.lock().unwrap() = true)).unwrap();

    assert!(*ran.lock().unwrap());
}

#[test]
fn test_auto_timer_delay() {
    let auto = DeferBuilder::new()
        .order([Backend::Timer])
        .timer_delay(Duration::from_millis(30))
        .build();

    let (tx, rx) = mpsc::channel();
    let start = Instant::now();
    auto.defer(Box::new(move || {
        let _ = tx.send(start.elapsed());
    }))
    .unwrap();

    let elapsed = rx.recv_timeout(PATIENCE).unwrap();
    assert!(elapsed >= Duration::from_millis(30), "ran after {elapsed:?}");
}

#[test]
fn test_builder_defaults_and_dedup() {
    let auto = DeferBuilder::default().build();
    assert_eq!(auto.order(), &Backend::FALLBACK_ORDER);
    assert_eq!(auto.timer_delay(), Duration::ZERO);

    let auto = DeferBuilder::new()
        .order([Backend::Timer, Backend::Worker, Backend::Timer])
        .build();
    assert_eq!(auto.order(), &[Backend::Timer, Backend::Worker]);
}

#[test]
#[should_panic(expected = "at least one backend")]
fn test_builder_rejects_empty_order() {
    let _ = DeferBuilder::new().order(Vec::new());
}

#[test]
fn test_backend_labels() {
    assert_eq!(Backend::Microtask.as_label(), "microtask");
    assert_eq!(Backend::Worker.to_string(), "worker");
    assert_eq!(format!("{}", Backend::Timer), "timer");
}

#[test]
fn test_error_messages() {
    let closed = DeferError::Closed {
        backend: Backend::Worker,
    };
    assert_eq!(closed.to_string(), "the worker thread has stopped");
    assert_eq!(closed.as_label(), "defer_closed");

    let spawn = DeferError::Spawn {
        backend: Backend::Timer,
        source: std::io::Error::other("no threads left"),
    };
    assert_eq!(spawn.to_string(), "failed to start the timer thread: no threads left");
    assert_eq!(spawn.as_label(), "defer_spawn_failed");
    assert!(std::error::Error::source(&spawn).is_some());
}

#[test]
fn test_task_uses_configured_deferrer() {
    let auto = Arc::new(DeferBuilder::new().order([Backend::Worker]).build());
    let (left, left_cleanups) = tracked(&Task::<(), i32>::of(1));
    let (right, right_cleanups) = tracked(&Task::of(2));

    let task = left.with_deferrer(auto).concat(&right);
    let probe = Probe::new();
    probe.fork(&task);

    assert_eq!(probe.single(), Settled::Resolved(1));
    assert!(eventually(PATIENCE, || {
        left_cleanups.get() == 1 && right_cleanups.get() == 1
    }));
}
