#![cfg(test)]

use std::thread;
use std::time::Duration;

use foundation_synca::polling::{poll_until, poll_while, PollError};
use foundation_synca::synca::{BroadcastScope, CancelSignal, Event};
use ntest::timeout;

/// WHY: polling is the fallback when nobody signals the state change
/// WHAT: a poll sees a value set without any notification
#[test]
#[timeout(10000)]
fn polling_sees_silent_updates() {
    let event = Event::<bool>::new();
    let cancel = CancelSignal::new();

    let setter = event.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        setter.set(true);
    });

    poll_until(
        &cancel,
        Duration::from_millis(5),
        Duration::from_secs(5),
        || event.get(),
    )
    .expect("should observe the update");
    handle.join().expect("should join");
}

/// WHY: cancelling shuts down every poll sharing the signal
/// WHAT: two polls on one signal both report Cancelled
#[test]
#[timeout(10000)]
fn one_signal_cancels_many_polls() {
    let cancel = CancelSignal::new();

    let polls: Vec<_> = (0..2)
        .map(|_| {
            let cancel = cancel.clone();
            thread::spawn(move || {
                poll_while(
                    &cancel,
                    Duration::from_millis(5),
                    Duration::from_secs(30),
                    || true,
                )
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    cancel.cancel();

    for poll in polls {
        assert_eq!(Err(PollError::Cancelled), poll.join().expect("should join"));
    }
}

/// WHY: polls against an event share it with regular waiters
/// WHAT: polling and a guarded wait both observe the same broadcast value
#[test]
#[timeout(10000)]
fn polls_and_waits_agree() {
    let event = Event::<u32>::new();
    let cancel = CancelSignal::new();

    let waiter = event.clone();
    let handle = thread::spawn(move || waiter.block_until(|v| *v == 7));

    thread::sleep(Duration::from_millis(10));
    event.set_and_broadcast(7, BroadcastScope::All);

    poll_until(
        &cancel,
        Duration::from_millis(5),
        Duration::from_secs(5),
        || event.get() == 7,
    )
    .expect("should observe the value");
    handle.join().expect("should join");
}
