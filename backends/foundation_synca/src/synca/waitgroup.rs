// Implements a wait group on top of `Event` that refuses unsafe additions
// once a wait is draining it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BroadcastScope, Event, WaitGroupError, WaitGroupResult};

/// What `done()` does when it would take the count below zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderflowPolicy {
    /// Clamp at zero. The absorbed completion is logged as a warning since
    /// it usually points at a double `done()`.
    #[default]
    Saturate,

    /// Leave the count untouched and report [`WaitGroupError::Underflow`].
    Strict,
}

/// What `add()` does with a positive delta while a `wait()` is draining.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPolicy {
    /// Report [`WaitGroupError::AddAfterWait`] and leave the count untouched.
    #[default]
    Reject,

    /// Accept the addition, extending the wait.
    Allow,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitGroupConfig {
    pub underflow: UnderflowPolicy,
    pub add_after_wait: AddPolicy,
}

/// Payload of the event backing a [`WaitGroup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct GroupState {
    count: u64,

    /// Set when a `wait()` starts on a non-zero count, cleared once the
    /// count reaches zero.
    draining: bool,
}

/// `WaitGroup` counts outstanding work and lets callers block until it
/// is all done.
///
/// The count never goes negative. Once a `wait()` has started on a non-zero
/// count the group is draining: positive additions are refused (by default)
/// until the count reaches zero, after which the group can be reused.
///
/// Clones share the same counter.
#[derive(Clone, Debug, Default)]
pub struct WaitGroup {
    event: Event<GroupState>,
    config: WaitGroupConfig,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: WaitGroupConfig) -> Self {
        Self {
            event: Event::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> WaitGroupConfig {
        self.config
    }

    /// Adds `delta` to the count.
    ///
    /// A negative delta behaves like `|delta|` calls to [`WaitGroup::done`]
    /// applied at once, under the same underflow policy.
    ///
    /// # Errors
    ///
    /// Returns [`WaitGroupError::AddAfterWait`] for a positive delta while
    /// draining under [`AddPolicy::Reject`], and [`WaitGroupError::Underflow`]
    /// for a negative delta exceeding the count under
    /// [`UnderflowPolicy::Strict`].
    pub fn add(&self, delta: i64) -> WaitGroupResult<()> {
        if delta < 0 {
            return self.release(delta.unsigned_abs());
        }

        let delta = delta.unsigned_abs();
        let policy = self.config.add_after_wait;
        let mut outcome = Ok(());
        self.event.edit_and_broadcast(
            |state| {
                if state.draining && delta > 0 && policy == AddPolicy::Reject {
                    warn!(delta, count = state.count, "refusing add while draining");
                    outcome = Err(WaitGroupError::AddAfterWait { delta });
                    return *state;
                }
                GroupState {
                    count: state.count.saturating_add(delta),
                    ..*state
                }
            },
            BroadcastScope::All,
        );
        outcome
    }

    /// Marks one unit of work as finished.
    ///
    /// # Errors
    ///
    /// Returns [`WaitGroupError::Underflow`] when the count is already zero
    /// under [`UnderflowPolicy::Strict`].
    pub fn done(&self) -> WaitGroupResult<()> {
        self.release(1)
    }

    fn release(&self, delta: u64) -> WaitGroupResult<()> {
        let policy = self.config.underflow;
        let mut outcome = Ok(());
        self.event.edit_and_broadcast(
            |state| {
                let count = match (state.count.checked_sub(delta), policy) {
                    (Some(count), _) => count,
                    (None, UnderflowPolicy::Saturate) => {
                        warn!(
                            delta,
                            count = state.count,
                            "wait group completions exceed additions, clamping at zero"
                        );
                        0
                    }
                    (None, UnderflowPolicy::Strict) => {
                        outcome = Err(WaitGroupError::Underflow {
                            count: state.count,
                            delta,
                        });
                        return *state;
                    }
                };
                GroupState {
                    count,
                    draining: state.draining && count != 0,
                }
            },
            BroadcastScope::All,
        );
        outcome
    }

    /// Forces the count back to zero, releasing every waiter.
    pub fn reset_count(&self) {
        let mut previous = 0;
        self.event.edit_and_broadcast(
            |state| {
                previous = state.count;
                GroupState::default()
            },
            BroadcastScope::All,
        );
        info!(previous, "wait group count reset");
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.event.read(|state| state.count)
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.event.read(|state| state.draining)
    }

    /// Blocks until the count is zero.
    pub fn wait(&self) {
        self.begin_draining();
        self.event.block_while(|state| state.count != 0);
    }

    /// Blocks until the count is zero or `timeout` passes, returning true
    /// if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.begin_draining();
        self.event
            .block_until_timeout(|state| state.count == 0, timeout)
    }

    fn begin_draining(&self) {
        self.event.edit(|state| GroupState {
            draining: state.count != 0,
            ..*state
        });
    }
}
