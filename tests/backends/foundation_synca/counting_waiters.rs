#![cfg(test)]

use std::thread;
use std::time::{Duration, Instant};

use foundation_synca::synca::{
    CancelSignal, SemWait, UnderflowPolicy, WaitGroup, WaitGroupConfig, WaitGroupError,
    WaitOutcome,
};
use ntest::timeout;

/// WHY: the canonical fan-out, fan-in use of a wait group
/// WHAT: add(5), five workers call done, wait returns with a zero count
#[test]
#[timeout(10000)]
fn wait_group_fans_in_workers() {
    let group = WaitGroup::new();
    group.add(5).expect("should add");

    let workers: Vec<_> = (0..5u64)
        .map(|i| {
            let group = group.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5 * i));
                group.done().expect("should complete");
            })
        })
        .collect();

    group.wait();
    assert_eq!(0, group.count());

    for worker in workers {
        worker.join().expect("should join");
    }
}

/// WHY: over-completion is a bug the strict policy must surface
/// WHAT: a strict group reports underflow and keeps its count
#[test]
fn strict_wait_group_reports_extra_done() {
    let group = WaitGroup::with_config(WaitGroupConfig {
        underflow: UnderflowPolicy::Strict,
        ..WaitGroupConfig::default()
    });
    group.add(2).expect("should add");
    group.add(-2).expect("should release");

    assert_eq!(
        Err(WaitGroupError::Underflow { count: 0, delta: 1 }),
        group.done()
    );
    assert_eq!(0, group.count());
}

/// WHY: a wait group is reusable once drained
/// WHAT: two full add, done, wait cycles on one group
#[test]
#[timeout(10000)]
fn wait_group_is_reusable_after_drain() {
    let group = WaitGroup::new();

    for _ in 0..2 {
        group.add(2).expect("should add");
        let worker = group.clone();
        let handle = thread::spawn(move || {
            worker.done().expect("should complete");
            worker.done().expect("should complete");
        });
        group.wait();
        handle.join().expect("should join");
        assert!(!group.is_draining());
    }
}

/// WHY: a semaphore waiter with a timeout must give up after the timeout
/// WHAT: count 3, 100ms timeout returns false no sooner than 100ms
#[test]
#[timeout(10000)]
fn sem_wait_times_out() {
    let sem = SemWait::new();
    sem.add(3);

    let started = Instant::now();
    assert!(!sem.wait_with_timeout(Duration::from_millis(100)));
    assert!(started.elapsed() >= Duration::from_millis(100));
}

/// WHY: a drained semaphore must not hold its caller for the timeout
/// WHAT: a fresh waiter with a 5s timeout returns true well within 1s
#[test]
#[timeout(10000)]
fn sem_wait_on_zero_count_returns_immediately() {
    let sem = SemWait::new();

    let started = Instant::now();
    assert!(sem.wait_with_timeout(Duration::from_secs(5)));
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// WHY: the raw completion channel lets callers race the wait against
/// their own cancellation
/// WHAT: a linked cancel signal retires the pending wait
#[test]
#[timeout(10000)]
fn sem_wait_channel_races_cancellation() {
    let sem = SemWait::new();
    sem.add(1);

    let cancel = CancelSignal::new();
    let completion = sem.raw_completion_channel().expect("should spawn");
    completion.cancel_on(&cancel);

    cancel.cancel();
    assert_eq!(WaitOutcome::Cancelled, completion.recv());

    let completion = sem.raw_completion_channel().expect("should spawn");
    sem.done();
    assert_eq!(WaitOutcome::Completed, completion.recv());
}
