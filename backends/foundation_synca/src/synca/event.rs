// Implements a value-holding event usable across threads: a lock guarded
// payload with a wake-one (signal) path and a broadcast path.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

use super::registry::{SlotState, WaiterId, WaiterRegistry};
use super::{Completion, EventResult, RunOnDrop, WaitMode, WaitOutcome};

/// `BroadcastScope` picks which waiters a broadcast reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Wake every primary waiter and every broadcast waiter.
    #[default]
    All,

    /// Wake only the waiters parked through [`Event::wait_on_broadcast`].
    ExcludePrimary,
}

/// The notification path a waiter is parked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Path {
    Primary,
    Broadcast,
}

pub(crate) enum Notify {
    Signal,
    Broadcast(BroadcastScope),
}

struct Monitor<T> {
    value: T,
    primary: WaiterRegistry,
    broadcast: WaiterRegistry,
}

impl<T> Monitor<T> {
    fn registry(&mut self, path: Path) -> &mut WaiterRegistry {
        match path {
            Path::Primary => &mut self.primary,
            Path::Broadcast => &mut self.broadcast,
        }
    }
}

struct Shared<T> {
    /// Guards the payload and both waiter registries.
    monitor: Mutex<Monitor<T>>,

    /// Paired with `monitor`, used by signal and guarded waits.
    primary: Condvar,

    /// Paired with `monitor`, used purely as a broadcast rendezvous.
    broadcast: Condvar,
}

impl<T> Shared<T> {
    fn condvar(&self, path: Path) -> &Condvar {
        match path {
            Path::Primary => &self.primary,
            Path::Broadcast => &self.broadcast,
        }
    }

    /// Hands out wake tokens under the monitor lock, then kicks the
    /// condition variables whose registries actually woke someone.
    fn notify(&self, monitor: &mut Monitor<T>, notify: Notify) {
        let primary_woken = match notify {
            Notify::Signal => monitor.primary.wake_one(),
            Notify::Broadcast(BroadcastScope::All) => monitor.primary.wake_all() > 0,
            Notify::Broadcast(BroadcastScope::ExcludePrimary) => false,
        };
        let broadcast_woken = monitor.broadcast.wake_all() > 0;

        // waiters check their own token, so every parked thread must get
        // a chance to look.
        if primary_woken {
            self.primary.notify_all();
        }
        if broadcast_woken {
            self.broadcast.notify_all();
        }
    }

    /// Passes a signal on when the waiter holding it retires without
    /// consuming it.
    fn hand_off(&self, monitor: &mut Monitor<T>, path: Path, last: Option<SlotState>) {
        if last == Some(SlotState::Woken { handoff: true }) && monitor.registry(path).wake_one() {
            self.condvar(path).notify_all();
        }
    }
}

/// `Event` holds a payload of type `T` behind a single monitor lock and lets
/// threads wait on it in two ways:
///
/// - the primary path, woken one at a time by [`Event::signal`] or all at
///   once by [`Event::broadcast`], used by the guarded waits
///   ([`Event::wait_until`], [`Event::wait_while`]) and the single shot
///   waits ([`Event::wait_for_signal`], `test_then_wait_*`).
/// - the broadcast path ([`Event::wait_on_broadcast`]), woken by every
///   signal and broadcast but never correlated with a payload value.
///
/// Notifications are not latched: only waiters already registered when the
/// notification is issued are woken. Registration and notification both
/// happen under the payload lock, and a wait is registered before its call
/// returns, so it can never miss a later notification on either path, even
/// when a detached wait's thread has not started blocking yet.
///
/// `Event` is a handle; clones share the same payload and waiters.
pub struct Event<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let monitor = self.lock();
        f.debug_struct("Event")
            .field("value", &monitor.value)
            .field("primary_waiters", &monitor.primary.len())
            .field("broadcast_waiters", &monitor.broadcast.len())
            .finish()
    }
}

// --- constructors

impl<T: Default> Event<T> {
    /// Creates an event holding the zero value of `T`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_value(T::default())
    }
}

impl<T> Event<T> {
    pub fn with_value(value: T) -> Self {
        Self {
            inner: Arc::new(Shared {
                monitor: Mutex::new(Monitor {
                    value,
                    primary: WaiterRegistry::new(),
                    broadcast: WaiterRegistry::new(),
                }),
                primary: Condvar::new(),
                broadcast: Condvar::new(),
            }),
        }
    }

    /// Locks the monitor.
    ///
    /// A caller closure that panics while the lock is held unwinds through
    /// the guard, which releases the lock; the payload is only ever
    /// replaced after an editor returns, so the poison flag carries no
    /// information here and is cleared.
    fn lock(&self) -> MutexGuard<'_, Monitor<T>> {
        self.inner.monitor.lock().unwrap_or_else(|poisoned| {
            let guard = poisoned.into_inner();
            self.inner.monitor.clear_poison();
            guard
        })
    }
}

// --- payload operations

impl<T> Event<T> {
    /// Returns a snapshot of the payload.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.lock().value.clone()
    }

    /// Runs `f` against the payload under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().value)
    }

    pub fn set(&self, value: T) {
        self.lock().value = value;
    }

    /// Replaces the payload with `f(payload)` atomically.
    pub fn edit(&self, f: impl FnOnce(&T) -> T) {
        let mut monitor = self.lock();
        let next = f(&monitor.value);
        monitor.value = next;
    }

    pub fn set_and_signal(&self, value: T) {
        let mut monitor = self.lock();
        monitor.value = value;
        self.inner.notify(&mut monitor, Notify::Signal);
    }

    pub fn edit_and_signal(&self, f: impl FnOnce(&T) -> T) {
        let mut monitor = self.lock();
        let next = f(&monitor.value);
        monitor.value = next;
        self.inner.notify(&mut monitor, Notify::Signal);
    }

    pub fn set_and_broadcast(&self, value: T, scope: BroadcastScope) {
        let mut monitor = self.lock();
        monitor.value = value;
        self.inner.notify(&mut monitor, Notify::Broadcast(scope));
    }

    pub fn edit_and_broadcast(&self, f: impl FnOnce(&T) -> T, scope: BroadcastScope) {
        let mut monitor = self.lock();
        let next = f(&monitor.value);
        monitor.value = next;
        self.inner.notify(&mut monitor, Notify::Broadcast(scope));
    }

    /// Wakes one primary waiter and every broadcast waiter.
    ///
    /// The signal is lost if nobody is waiting.
    pub fn signal(&self) {
        let mut monitor = self.lock();
        self.inner.notify(&mut monitor, Notify::Signal);
    }

    /// Wakes all waiters within `scope`, lost if nobody is waiting.
    pub fn broadcast(&self, scope: BroadcastScope) {
        let mut monitor = self.lock();
        self.inner.notify(&mut monitor, Notify::Broadcast(scope));
    }

    /// Wakes only the broadcast waiters.
    pub fn broadcast_only(&self) {
        self.broadcast(BroadcastScope::ExcludePrimary);
    }

    /// Applies `edit` if `test` holds for the payload, within one critical
    /// section. Under contention at most one caller wins a given transition.
    pub fn test_and_edit_if_match(
        &self,
        test: impl FnOnce(&T) -> bool,
        edit: impl FnOnce(&T) -> T,
    ) -> bool {
        let mut monitor = self.lock();
        if !test(&monitor.value) {
            return false;
        }
        let next = edit(&monitor.value);
        monitor.value = next;
        true
    }

    /// Number of wait operations currently running against this event,
    /// parked or not.
    pub fn waiter_count(&self) -> usize {
        let monitor = self.lock();
        monitor.primary.len() + monitor.broadcast.len()
    }

    /// Number of waiters currently queued for a wake.
    pub fn parked_count(&self) -> usize {
        let monitor = self.lock();
        monitor.primary.parked() + monitor.broadcast.parked()
    }
}

// --- blocking waits

impl<T> Event<T> {
    /// Blocks the current thread until `pred(payload)` holds.
    ///
    /// Re-checks the payload after every wake, so neither a lost nor a
    /// spurious wakeup can end the wait early or keep it blocked once the
    /// condition holds and a notification follows.
    pub fn block_until(&self, mut pred: impl FnMut(&T) -> bool) {
        let id = self.enroll(Path::Primary);
        let outcome = self.run_wait(Path::Primary, id, None, |value, _| pred(value));
        debug_assert_eq!(WaitOutcome::Completed, outcome);
    }

    /// Blocks the current thread while `pred(payload)` holds.
    pub fn block_while(&self, mut pred: impl FnMut(&T) -> bool) {
        self.block_until(|value| !pred(value));
    }

    /// Like [`Event::block_until`] but gives up once `timeout` has elapsed.
    ///
    /// Returns true if the condition held before the deadline; false is
    /// only returned after at least `timeout` and leaves nothing behind.
    pub fn block_until_timeout(&self, mut pred: impl FnMut(&T) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let id = self.enroll(Path::Primary);
        self.run_wait(Path::Primary, id, deadline, |value, _| pred(value))
            == WaitOutcome::Completed
    }

    fn enroll(&self, path: Path) -> WaiterId {
        self.lock().registry(path).enroll()
    }

    /// Removes a finished wait from its registry.
    fn retire(&self, path: Path, id: WaiterId) {
        let mut monitor = self.lock();
        let last = monitor.registry(path).leave(id);
        self.inner.hand_off(&mut monitor, path, last);
    }

    /// Marks a running wait as cancelled and wakes it so it can retire.
    pub(crate) fn cancel_waiter(&self, path: Path, id: WaiterId) -> bool {
        let mut monitor = self.lock();
        if !self.cancel_locked(&mut monitor, path, id) {
            return false;
        }
        drop(monitor);

        debug!(waiter = id, "cancelled wait");
        true
    }

    fn cancel_locked(&self, monitor: &mut Monitor<T>, path: Path, id: WaiterId) -> bool {
        let Some(last) = monitor.registry(path).cancel(id) else {
            return false;
        };
        self.inner.hand_off(monitor, path, Some(last));
        self.inner.condvar(path).notify_all();
        true
    }

    /// Drives one enrolled wait operation to its end.
    ///
    /// `done` sees the payload and the round number: round 0 runs before
    /// any blocking, round N after the Nth wake. The wait completes as soon
    /// as `done` returns true, otherwise the waiter parks until its token
    /// is woken, cancelled or the deadline passes.
    fn run_wait<F>(
        &self,
        path: Path,
        id: WaiterId,
        deadline: Option<Instant>,
        mut done: F,
    ) -> WaitOutcome
    where
        F: FnMut(&mut T, usize) -> bool,
    {
        let _leave = RunOnDrop::new(|| self.retire(path, id));

        let condvar = self.inner.condvar(path);
        let mut monitor = self.lock();
        let mut round = 0;
        loop {
            if monitor.registry(path).state(id) == Some(SlotState::Cancelled) {
                return WaitOutcome::Cancelled;
            }

            if done(&mut monitor.value, round) {
                return WaitOutcome::Completed;
            }

            round += 1;
            match monitor.registry(path).park(id) {
                Some(SlotState::Parked) => {}
                Some(SlotState::Woken { .. }) => continue,
                _ => return WaitOutcome::Cancelled,
            }

            loop {
                monitor = match deadline {
                    None => condvar.wait(monitor).unwrap_or_else(PoisonError::into_inner),
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            debug!(waiter = id, "wait reached its deadline");
                            return WaitOutcome::TimedOut;
                        }
                        condvar
                            .wait_timeout(monitor, remaining)
                            .map_or_else(|poisoned| poisoned.into_inner().0, |(guard, _)| guard)
                    }
                };

                match monitor.registry(path).take_wake(id) {
                    Some(SlotState::Woken { .. }) => break,
                    Some(SlotState::Parked) => continue,
                    _ => return WaitOutcome::Cancelled,
                }
            }
        }
    }
}

// --- mode driven waits

impl<T: Send + 'static> Event<T> {
    fn dispatch<F>(&self, path: Path, mode: WaitMode, done: F) -> EventResult<Completion>
    where
        F: FnMut(&mut T, usize) -> bool + Send + 'static,
    {
        match mode {
            WaitMode::Blocking => {
                let id = self.enroll(path);
                Ok(Completion::resolved(self.run_wait(path, id, None, done)))
            }
            WaitMode::Detached { timeout } => self.spawn_wait(path, timeout, done),
        }
    }

    /// Runs the wait on a dedicated thread and returns its completion.
    ///
    /// The deadline is fixed before the thread starts and enforced inside
    /// the condition wait, so the thread retires itself when it expires.
    fn spawn_wait<F>(
        &self,
        path: Path,
        timeout: Option<Duration>,
        done: F,
    ) -> EventResult<Completion>
    where
        F: FnMut(&mut T, usize) -> bool + Send + 'static,
    {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let id = self.enroll(path);

        let canceller = self.clone();
        let completion = Completion::pending(move || canceller.cancel_waiter(path, id));

        let resolver = completion.clone();
        let event = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("synca_waiter_{id}"))
            .spawn(move || {
                let span = tracing::trace_span!("Event::detached_wait", waiter = id);
                let _enter = span.enter();

                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
                    event.run_wait(path, id, deadline, done)
                })) {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(waiter = id, "detached wait panicked");
                        WaitOutcome::Faulted
                    }
                };

                debug!(waiter = id, ?outcome, "detached wait finished");
                resolver.resolve(outcome);
            });

        match spawned {
            Ok(_detached) => Ok(completion),
            Err(err) => {
                error!(waiter = id, "failed to start detached wait: {}", err);
                self.retire(path, id);
                Err(err.into())
            }
        }
    }

    /// Waits for exactly one wake on the primary path.
    pub fn wait_for_signal(&self, mode: WaitMode) -> EventResult<Completion> {
        self.dispatch(Path::Primary, mode, |_, round| round > 0)
    }

    /// Waits for exactly one wake on the broadcast path.
    ///
    /// The payload is not consulted, a woken caller has to read it again.
    pub fn wait_on_broadcast(&self, mode: WaitMode) -> EventResult<Completion> {
        self.dispatch(Path::Broadcast, mode, |_, round| round > 0)
    }

    /// Guarded wait until `pred(payload)` holds.
    pub fn wait_until<F>(&self, mut pred: F, mode: WaitMode) -> EventResult<Completion>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.dispatch(Path::Primary, mode, move |value, _| pred(value))
    }

    /// Guarded wait while `pred(payload)` holds.
    pub fn wait_while<F>(&self, mut pred: F, mode: WaitMode) -> EventResult<Completion>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.dispatch(Path::Primary, mode, move |value, _| !pred(value))
    }

    /// Waits for one primary wake then applies `f` before releasing the
    /// lock the wake was observed under.
    pub fn wait_signal_then_edit<F>(&self, f: F, mode: WaitMode) -> EventResult<Completion>
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        let mut edit = Some(f);
        self.dispatch(Path::Primary, mode, move |value, round| {
            if round == 0 {
                return false;
            }
            if let Some(f) = edit.take() {
                let next = f(value);
                *value = next;
            }
            true
        })
    }
}

impl<T: PartialEq + Send + 'static> Event<T> {
    /// Waits once on the primary path if the payload equals `value`.
    ///
    /// Unlike the guarded waits this does not re-check after waking and
    /// can miss a transition that happens before the wait parks.
    pub fn test_then_wait_if_match(&self, value: T, mode: WaitMode) -> EventResult<Completion> {
        self.dispatch(Path::Primary, mode, move |current, round| {
            round > 0 || *current != value
        })
    }

    /// Waits once on the primary path if the payload differs from `value`.
    pub fn test_then_wait_if_not_match(
        &self,
        value: T,
        mode: WaitMode,
    ) -> EventResult<Completion> {
        self.dispatch(Path::Primary, mode, move |current, round| {
            round > 0 || *current == value
        })
    }
}
