use std::{fmt, sync::Arc, time::Duration};

use super::hooks::{HookId, OnceHooks};
use super::{BroadcastScope, Event};

/// `CancelSignal` is a cloneable cancellation source.
///
/// Once cancelled it stays cancelled. Waits linked to it through
/// [`super::Completion::cancel_on`] are retired when it fires, and the
/// polling helpers stop as soon as it fires.
#[derive(Clone, Default)]
pub struct CancelSignal {
    flag: Event<bool>,
    hooks: Arc<OnceHooks<()>>,
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .field("pending_hooks", &self.pending_hooks())
            .finish()
    }
}

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the signal, returns false if it already was.
    pub fn cancel(&self) -> bool {
        if !self.flag.test_and_edit_if_match(|cancelled| !*cancelled, |_| true) {
            return false;
        }

        debug!("cancel signal fired");
        self.flag.broadcast(BroadcastScope::All);
        self.hooks.fire(());
        true
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }

    /// Blocks until the signal is cancelled.
    pub fn wait(&self) {
        self.flag.block_until(|cancelled| *cancelled);
    }

    /// Blocks for at most `timeout`, returns true if cancelled meanwhile.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.flag.block_until_timeout(|cancelled| *cancelled, timeout)
    }

    /// Runs `hook` once the signal is cancelled, immediately if it already is.
    ///
    /// Returns the hook's id while it is pending. Callers that outlive
    /// their interest in the signal should pass it to
    /// [`CancelSignal::remove_on_cancel`], the signal holds the hook until
    /// it fires otherwise.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) -> Option<HookId> {
        self.hooks.register(Box::new(move |()| hook()))
    }

    /// Drops a pending hook, returns false if it already ran or was removed.
    pub fn remove_on_cancel(&self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    pub(crate) fn pending_hooks(&self) -> usize {
        self.hooks.pending()
    }
}
