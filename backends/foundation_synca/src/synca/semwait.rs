use std::time::Duration;

use super::{BroadcastScope, Completion, Event, EventResult, WaitMode};

/// `SemWait` is a plain counting waiter: a signed counter whose waiters are
/// released whenever it is exactly zero.
///
/// Unlike [`super::WaitGroup`] it accepts any delta at any time, including
/// ones taking the counter negative, and every change is broadcast.
#[derive(Clone, Debug, Default)]
pub struct SemWait {
    event: Event<i64>,
}

impl SemWait {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delta: i64) {
        self.event
            .edit_and_broadcast(|count| count.saturating_add(delta), BroadcastScope::All);
    }

    pub fn done(&self) {
        self.add(-1);
    }

    pub fn reset_count(&self) {
        self.event.set_and_broadcast(0, BroadcastScope::All);
    }

    #[must_use]
    pub fn count(&self) -> i64 {
        self.event.get()
    }

    /// Blocks until the counter is zero.
    pub fn wait(&self) {
        self.event.block_until(|count| *count == 0);
    }

    /// Blocks until the counter is zero or `timeout` passes.
    ///
    /// Returns true if zero was observed in time. Nothing keeps waiting
    /// once this returns.
    pub fn wait_with_timeout(&self, timeout: Duration) -> bool {
        self.event.block_until_timeout(|count| *count == 0, timeout)
    }

    /// Starts a detached wait for the counter to reach zero and returns its
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns [`super::EventError::FailedStart`] if the waiting thread
    /// could not be started.
    pub fn raw_completion_channel(&self) -> EventResult<Completion> {
        self.event
            .wait_until(|count| *count == 0, WaitMode::detached())
    }
}
