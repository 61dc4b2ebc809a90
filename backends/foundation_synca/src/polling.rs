//! Interval polling helpers.
//!
//! Each helper evaluates a caller predicate once per interval, starting one
//! interval after the call, until the predicate is satisfied, the timeout
//! elapses or a [`CancelSignal`] fires. The sleep between ticks waits on the
//! cancel signal itself, so a cancellation ends the poll right away instead
//! of at the next tick.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::synca::CancelSignal;

pub type PollResult<T> = std::result::Result<T, PollError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    /// The timeout elapsed before the predicate was satisfied.
    Timeout,

    /// The cancel signal fired before the predicate was satisfied.
    Cancelled,

    /// A zero interval was given.
    InvalidInterval,
}

impl PollError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled)
    }
}

impl core::error::Error for PollError {}

impl core::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "PollError::Timeout"),
            Self::Cancelled => write!(f, "PollError::Cancelled"),
            Self::InvalidInterval => write!(f, "PollError::InvalidInterval"),
        }
    }
}

/// Polling settings as found in configuration files, e.g. in TOML:
///
/// ```toml
/// interval_ms = 50
/// timeout_ms = 2000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(rename = "interval_ms", with = "crate::extensions::serde_ext::duration_millis")]
    pub interval: Duration,

    #[serde(rename = "timeout_ms", with = "crate::extensions::serde_ext::duration_millis")]
    pub timeout: Duration,
}

impl PollConfig {
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Polls `predicate` every `interval` until it returns true.
///
/// # Errors
///
/// Returns [`PollError::Timeout`] once `timeout` has elapsed, including when
/// a tick falls exactly on the deadline, [`PollError::Cancelled`] when
/// `cancel` fires first and [`PollError::InvalidInterval`] for a zero
/// interval.
pub fn poll_until(
    cancel: &CancelSignal,
    interval: Duration,
    timeout: Duration,
    mut predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    if interval.is_zero() {
        return Err(PollError::InvalidInterval);
    }

    let started = Instant::now();
    let deadline = started.checked_add(timeout);
    let mut next_tick = started.checked_add(interval);
    let mut ticks: u64 = 0;

    loop {
        let wake_at = match (next_tick, deadline) {
            (Some(tick), Some(deadline)) => tick.min(deadline),
            (Some(at), None) | (None, Some(at)) => at,
            (None, None) => {
                cancel.wait();
                return Err(PollError::Cancelled);
            }
        };

        if cancel.wait_timeout(wake_at.saturating_duration_since(Instant::now())) {
            debug!(ticks, "poll cancelled");
            return Err(PollError::Cancelled);
        }

        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            debug!(ticks, "poll timed out");
            return Err(PollError::Timeout);
        }

        let Some(tick) = next_tick else { continue };
        if now < tick {
            continue;
        }

        ticks += 1;
        if predicate() {
            return Ok(());
        }
        next_tick = tick_after(tick, interval, Instant::now());
    }
}

/// Same contract as [`poll_until`].
///
/// # Errors
///
/// See [`poll_until`].
pub fn wait_for(
    cancel: &CancelSignal,
    interval: Duration,
    timeout: Duration,
    predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    poll_until(cancel, interval, timeout, predicate)
}

/// Polls `predicate` every `interval` until it returns false.
///
/// # Errors
///
/// See [`poll_until`].
pub fn poll_while(
    cancel: &CancelSignal,
    interval: Duration,
    timeout: Duration,
    mut predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    poll_until(cancel, interval, timeout, move || !predicate())
}

/// [`poll_until`] driven by a [`PollConfig`].
///
/// # Errors
///
/// See [`poll_until`].
pub fn poll_until_with(
    cancel: &CancelSignal,
    config: &PollConfig,
    predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    poll_until(cancel, config.interval, config.timeout, predicate)
}

/// [`wait_for`] driven by a [`PollConfig`].
///
/// # Errors
///
/// See [`poll_until`].
pub fn wait_for_with(
    cancel: &CancelSignal,
    config: &PollConfig,
    predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    wait_for(cancel, config.interval, config.timeout, predicate)
}

/// [`poll_while`] driven by a [`PollConfig`].
///
/// # Errors
///
/// See [`poll_until`].
pub fn poll_while_with(
    cancel: &CancelSignal,
    config: &PollConfig,
    predicate: impl FnMut() -> bool,
) -> PollResult<()> {
    poll_while(cancel, config.interval, config.timeout, predicate)
}

/// First tick strictly after `now`, skipping any ticks a slow predicate
/// made us miss.
fn tick_after(tick: Instant, interval: Duration, now: Instant) -> Option<Instant> {
    let mut next = tick.checked_add(interval)?;
    while next <= now {
        next = next.checked_add(interval)?;
    }
    Some(next)
}
