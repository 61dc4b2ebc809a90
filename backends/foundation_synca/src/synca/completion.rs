// Implements the completion channel handed out by mode driven waits.

use std::{fmt, sync::Arc, time::Duration};

use super::hooks::{HookId, OnceHooks};
use super::{BroadcastScope, CancelSignal, Event};

/// How a wait operation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The wait condition was satisfied.
    Completed,

    /// The deadline of a detached wait passed first.
    TimedOut,

    /// The wait was cancelled before it was satisfied.
    Cancelled,

    /// A caller supplied closure panicked inside a detached wait.
    Faulted,
}

impl WaitOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

type Canceller = Box<dyn Fn() -> bool + Send + Sync>;

struct CompletionState {
    outcome: Event<Option<WaitOutcome>>,
    hooks: OnceHooks<WaitOutcome>,
    canceller: Option<Canceller>,
}

/// `Completion` is the single-use channel a wait operation resolves once
/// with its [`WaitOutcome`].
///
/// Blocking waits hand back an already resolved completion; detached waits
/// hand back a pending one that resolves when the background wait ends.
/// Clones observe the same resolution.
///
/// Dropping every clone does not stop a detached wait without a deadline,
/// call [`Completion::cancel`] (or link it with [`Completion::cancel_on`])
/// to retire it.
#[derive(Clone)]
pub struct Completion {
    state: Arc<CompletionState>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("outcome", &self.try_recv())
            .field("pending_hooks", &self.pending_hooks())
            .finish_non_exhaustive()
    }
}

impl Completion {
    pub(crate) fn resolved(outcome: WaitOutcome) -> Self {
        let completion = Self::new(None);
        completion.resolve(outcome);
        completion
    }

    pub(crate) fn pending(canceller: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::new(Some(Box::new(canceller)))
    }

    fn new(canceller: Option<Canceller>) -> Self {
        Self {
            state: Arc::new(CompletionState {
                outcome: Event::new(),
                hooks: OnceHooks::new(),
                canceller,
            }),
        }
    }

    /// Resolves the completion, only the first resolution sticks.
    ///
    /// The outcome is published before any hook runs, so hooks and the
    /// callers they wake always observe a resolved completion.
    pub(crate) fn resolve(&self, outcome: WaitOutcome) -> bool {
        let won = self
            .state
            .outcome
            .test_and_edit_if_match(Option::is_none, |_| Some(outcome));
        if !won {
            return false;
        }

        self.state.outcome.broadcast(BroadcastScope::All);
        self.state.hooks.fire(outcome);
        true
    }

    /// Blocks until the wait resolves.
    pub fn recv(&self) -> WaitOutcome {
        loop {
            if let Some(outcome) = self.try_recv() {
                return outcome;
            }
            self.state.outcome.block_until(Option::is_some);
        }
    }

    /// Blocks for at most `timeout` for the wait to resolve.
    ///
    /// Giving up here only abandons interest, the wait keeps running; use
    /// [`Completion::cancel`] to retire it.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WaitOutcome> {
        if self
            .state
            .outcome
            .block_until_timeout(Option::is_some, timeout)
        {
            return self.try_recv();
        }
        None
    }

    pub fn try_recv(&self) -> Option<WaitOutcome> {
        self.state.outcome.get()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.try_recv().is_some()
    }

    /// Cancels the underlying wait if it is still pending.
    ///
    /// Returns true when the cancellation reached a running wait, the
    /// completion then resolves to [`WaitOutcome::Cancelled`] shortly.
    pub fn cancel(&self) -> bool {
        if self.is_resolved() {
            return false;
        }
        match &self.state.canceller {
            Some(cancel) => cancel(),
            None => false,
        }
    }

    /// Cancels this wait as soon as `signal` is cancelled, letting a caller
    /// race the wait against any other cancellation source.
    ///
    /// The link is dropped from `signal` once the wait resolves.
    pub fn cancel_on(&self, signal: &CancelSignal) {
        let completion = self.clone();
        let Some(id) = signal.on_cancel(move || {
            completion.cancel();
        }) else {
            return;
        };

        let signal = signal.clone();
        self.on_resolve(move |_| {
            signal.remove_on_cancel(id);
        });
    }

    /// Runs `hook` with the outcome once the completion resolves, or right
    /// away if it already has.
    ///
    /// Returns the hook's id while it is pending, see
    /// [`Completion::remove_on_resolve`].
    pub fn on_resolve(&self, hook: impl FnOnce(WaitOutcome) + Send + 'static) -> Option<HookId> {
        self.state.hooks.register(Box::new(hook))
    }

    /// Drops a pending resolve hook, returns false if it already ran or was
    /// removed.
    pub fn remove_on_resolve(&self, id: HookId) -> bool {
        self.state.hooks.remove(id)
    }

    pub(crate) fn pending_hooks(&self) -> usize {
        self.state.hooks.pending()
    }
}
