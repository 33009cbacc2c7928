use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::thread::scope;
use threads::{Error, Future};

#[test]
fn get_now_before_set_is_none() {
    let future: Future<i32> = Future::pending();
    assert!(future.get_now().is_none());
    assert!(!future.is_ready());
}

#[test]
fn set_then_get_wait_returns_value() {
    let future = Future::pending();
    future.set("value".to_owned()).unwrap();
    assert_eq!(future.get_wait().unwrap(), "value");
    assert_eq!(future.get_now().unwrap().unwrap(), "value");
    assert!(future.is_ready());
}

#[test]
fn ready_future_is_already_complete() {
    let future = Future::ready(5);
    assert!(future.is_ready());
    assert_eq!(future.get_now().unwrap().unwrap(), 5);
}

#[test]
fn second_set_is_rejected_and_keeps_first_value() {
    let future = Future::pending();
    future.set(1).unwrap();
    assert!(matches!(future.set(2), Err(Error::AlreadyCompleted)));
    assert_eq!(future.get_wait().unwrap(), 1);
}

#[test]
fn get_wait_blocks_until_set_from_another_thread() {
    let future = Future::pending();
    let writer = future.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.set(42).unwrap();
    });

    let start = Instant::now();
    assert_eq!(future.get_wait().unwrap(), 42);
    assert!(start.elapsed() >= Duration::from_millis(40));
    handle.join().unwrap();
}

#[test]
fn get_timeout_expires_without_consuming_the_value() {
    let future = Future::pending();
    assert!(future.get_timeout(Duration::from_millis(20)).is_none());

    future.set(7).unwrap();
    assert_eq!(future.get_timeout(Duration::from_millis(20)).unwrap().unwrap(), 7);
    assert_eq!(future.get_wait().unwrap(), 7);
}

#[test]
fn get_timeout_returns_once_set_within_bound() {
    let future = Future::pending();
    let writer = future.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        writer.set(3).unwrap();
    });

    let result = future.get_timeout(Duration::from_secs(5));
    assert_eq!(result.unwrap().unwrap(), 3);
    handle.join().unwrap();
}

#[test]
fn concurrent_readers_all_observe_the_same_value() {
    let future = Future::pending();
    let writer = future.clone();

    scope(|s| {
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let reader = future.clone();
                s.spawn(move |_| reader.get_wait().unwrap())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        writer.set(vec![1, 2, 3]).unwrap();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), vec![1, 2, 3]);
        }
    })
    .unwrap();
}

#[test]
fn then_runs_on_completion_and_immediately_when_ready() {
    let future = Future::pending();
    let (tx, rx) = mpsc::channel();

    let late = tx.clone();
    future.then(move |result| late.send(result.unwrap()).unwrap());
    assert!(rx.try_recv().is_err());

    future.set(10).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 10);

    future.then(move |result| tx.send(result.unwrap() + 1).unwrap());
    assert_eq!(rx.try_recv().unwrap(), 11);
}

#[test]
fn callbacks_run_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let future = Future::pending();
    for _ in 0..3 {
        let calls = calls.clone();
        future.then(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
    }
    future.set(()).unwrap();
    let _ = future.set(());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn map_chains_values() {
    let source = Future::pending();
    let doubled = source.map(|v: i32| v * 2);
    let text = doubled.map(|v| format!("got {v}"));
    assert!(text.get_now().is_none());

    source.set(21).unwrap();
    assert_eq!(doubled.get_wait().unwrap(), 42);
    assert_eq!(text.get_wait().unwrap(), "got 42");
}

#[test]
fn map_turns_panic_into_failure() {
    let source = Future::ready(0);
    let mapped = source.map(|v: i32| {
        if v == 0 {
            panic!("division by zero");
        }
        100 / v
    });
    match mapped.get_wait() {
        Err(Error::JobPanicked(message)) => assert!(message.contains("division by zero")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn panicking_callback_does_not_skip_later_callbacks() {
    let future = Future::pending();
    future.then(|_| panic!("callback failure"));
    let mapped = future.map(|v: i32| v + 1);

    future.set(1).unwrap();
    assert_eq!(future.get_wait().unwrap(), 1);
    assert_eq!(mapped.get_timeout(Duration::from_secs(1)).unwrap().unwrap(), 2);
}
