#![cfg(test)]

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use foundation_synca::synca::{BroadcastScope, CancelSignal, Event, WaitMode, WaitOutcome};
use ntest::timeout;
use serial_test::serial;
use tracing_test::traced_test;

fn wait_for_parked<T>(event: &Event<T>, count: usize) {
    while event.parked_count() < count {
        thread::sleep(Duration::from_millis(1));
    }
}

/// WHY: a broadcast issued after the listener registered must never be lost
/// WHAT: repeated rounds of listener + immediate broadcast always complete
#[test]
#[serial]
#[timeout(20000)]
fn broadcast_after_registration_is_never_missed() {
    let event = Event::<u32>::new();

    for round in 0..200 {
        let listener = event
            .wait_on_broadcast(WaitMode::detached())
            .expect("should spawn");
        assert_eq!(1, event.waiter_count());

        // the listener thread may not have blocked yet.
        event.set_and_broadcast(round, BroadcastScope::ExcludePrimary);
        assert_eq!(WaitOutcome::Completed, listener.recv());
    }

    assert_eq!(0, event.waiter_count());
}

/// WHY: a signal sent right after registration must reach the registered
/// waiter even before its thread blocks
/// WHAT: repeated rounds of waiter + immediate signal always complete
#[test]
#[serial]
#[timeout(20000)]
fn signal_after_registration_is_never_missed() {
    let event = Event::<u32>::new();

    for _ in 0..200 {
        let waiter = event
            .wait_for_signal(WaitMode::detached())
            .expect("should spawn");
        event.signal();
        assert_eq!(
            Some(WaitOutcome::Completed),
            waiter.recv_timeout(Duration::from_secs(5))
        );
    }

    assert_eq!(0, event.waiter_count());
}

/// WHY: linking many short waits to one long-lived cancel signal must not
/// pile up hooks on it
/// WHAT: after every linked wait finished, the signal holds no hooks
#[test]
#[timeout(20000)]
fn finished_waits_unlink_from_cancel_signal() {
    let event = Event::<u32>::new();
    let cancel = CancelSignal::new();

    for round in 1..=50 {
        let waiter = event
            .wait_until(move |v| *v == round, WaitMode::detached())
            .expect("should spawn");
        waiter.cancel_on(&cancel);
        event.set_and_broadcast(round, BroadcastScope::All);
        assert_eq!(WaitOutcome::Completed, waiter.recv());
    }

    while !format!("{cancel:?}").contains("pending_hooks: 0") {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!cancel.is_cancelled());
}

/// WHY: guarded waiters must see the state they waited for, whatever the
/// interleaving of producers
/// WHAT: consumers each wait for their own threshold while producers count up
#[test]
#[timeout(20000)]
fn guarded_waiters_observe_their_thresholds() {
    const PRODUCERS: usize = 4;
    const STEPS: u64 = 50;

    let event = Event::<u64>::new();
    let start = Arc::new(Barrier::new(PRODUCERS));

    let consumers: Vec<_> = [10u64, 75, 150, PRODUCERS as u64 * STEPS]
        .into_iter()
        .map(|threshold| {
            let event = event.clone();
            thread::spawn(move || {
                event.block_until(|v| *v >= threshold);
                threshold
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let event = event.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for _ in 0..STEPS {
                    event.edit_and_broadcast(|v| v + 1, BroadcastScope::All);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer should finish");
    }
    for consumer in consumers {
        let threshold = consumer.join().expect("consumer should finish");
        assert!(event.get() >= threshold);
    }
    assert_eq!(PRODUCERS as u64 * STEPS, event.get());
}

/// WHY: signals hand out one wake each, in arrival order
/// WHAT: N signals release N single shot waiters
#[test]
#[serial]
#[timeout(10000)]
fn each_signal_releases_one_waiter() {
    let event = Event::<u8>::new();

    let waiters: Vec<_> = (0..3)
        .map(|_| event.wait_for_signal(WaitMode::detached()).expect("spawn"))
        .collect();
    wait_for_parked(&event, 3);

    for released in 1..=3 {
        event.signal();
        while waiters.iter().filter(|w| w.is_resolved()).count() < released {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(
            released,
            waiters.iter().filter(|w| w.is_resolved()).count()
        );
    }
}

/// WHY: detached waits with a deadline must not outlive it
/// WHAT: many timed waits all resolve TimedOut and leave no registered waiter
#[test]
#[traced_test]
#[serial]
#[timeout(10000)]
fn timed_detached_waits_leave_nothing_behind() {
    let event = Event::<i32>::new();
    let started = Instant::now();

    let waits: Vec<_> = (0..16)
        .map(|_| {
            event
                .wait_until(
                    |v| *v < 0,
                    WaitMode::detached_with_timeout(Duration::from_millis(40)),
                )
                .expect("spawn")
        })
        .collect();

    for wait in &waits {
        assert_eq!(WaitOutcome::TimedOut, wait.recv());
    }
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(0, event.waiter_count());
}

/// WHY: a caller racing a wait against its own deadline can cancel it
/// WHAT: recv_timeout gives up, cancel retires the task
#[test]
#[timeout(10000)]
fn abandoned_wait_can_be_retired() {
    let event = Event::<i32>::new();
    let completion = event
        .wait_while(|v| *v == 0, WaitMode::detached())
        .expect("spawn");

    assert_eq!(None, completion.recv_timeout(Duration::from_millis(20)));
    assert!(completion.cancel());
    assert_eq!(WaitOutcome::Cancelled, completion.recv());

    while event.waiter_count() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
}

/// WHY: the payload lock must stay usable after caller code panics
/// WHAT: a panicking detached editor faults, later waits still work
#[test]
#[timeout(10000)]
fn event_survives_panicking_callers() {
    let event = Event::with_value(1);

    let faulted = event
        .wait_signal_then_edit(|_| panic!("bad editor"), WaitMode::detached())
        .expect("spawn");
    wait_for_parked(&event, 1);
    event.signal();
    assert_eq!(WaitOutcome::Faulted, faulted.recv());
    assert_eq!(1, event.get());

    let completion = event
        .wait_until(|v| *v == 2, WaitMode::detached())
        .expect("spawn");
    wait_for_parked(&event, 1);
    event.set_and_signal(2);
    assert_eq!(WaitOutcome::Completed, completion.recv());
}
