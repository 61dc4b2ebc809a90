// Implements a once-firing list of callbacks shared by completions and
// cancellation signals.

use std::sync::{Mutex, MutexGuard, PoisonError};

type Hook<A> = Box<dyn FnOnce(A) + Send>;

/// Identifies a registered hook so it can be removed before it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookId(u64);

enum HookState<A> {
    Pending {
        next_id: u64,
        hooks: Vec<(HookId, Hook<A>)>,
    },
    Fired(A),
}

/// `OnceHooks` collects callbacks until it is fired once with a value,
/// callbacks registered after that run immediately with the fired value.
///
/// Hooks always run outside the internal lock so a hook may freely
/// register further hooks or fire other lists.
pub(crate) struct OnceHooks<A: Clone> {
    state: Mutex<HookState<A>>,
}

impl<A: Clone> Default for OnceHooks<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone> OnceHooks<A> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(HookState::Pending {
                next_id: 0,
                hooks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HookState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fires the list, returns false when it was already fired in which
    /// case the value is dropped.
    pub(crate) fn fire(&self, value: A) -> bool {
        let hooks = {
            let mut state = self.lock();
            match &mut *state {
                HookState::Fired(_) => return false,
                HookState::Pending { hooks, .. } => {
                    let hooks = std::mem::take(hooks);
                    *state = HookState::Fired(value.clone());
                    hooks
                }
            }
        };

        for (_, hook) in hooks {
            hook(value.clone());
        }
        true
    }

    /// Registers `hook`, returning its id while it is pending. A hook
    /// registered after firing runs right away and gets no id.
    pub(crate) fn register(&self, hook: Hook<A>) -> Option<HookId> {
        let fired = {
            let mut state = self.lock();
            match &mut *state {
                HookState::Pending { next_id, hooks } => {
                    *next_id = next_id.wrapping_add(1);
                    let id = HookId(*next_id);
                    hooks.push((id, hook));
                    return Some(id);
                }
                HookState::Fired(value) => value.clone(),
            }
        };
        hook(fired);
        None
    }

    /// Drops a pending hook, returns false if it already ran or was removed.
    pub(crate) fn remove(&self, id: HookId) -> bool {
        let removed = {
            let mut state = self.lock();
            match &mut *state {
                HookState::Pending { hooks, .. } => hooks
                    .iter()
                    .position(|(hook_id, _)| *hook_id == id)
                    .map(|index| hooks.swap_remove(index)),
                HookState::Fired(_) => None,
            }
        };

        // the hook may own handles whose drop takes other locks.
        removed.is_some()
    }

    /// Number of hooks still waiting for the list to fire.
    pub(crate) fn pending(&self) -> usize {
        match &*self.lock() {
            HookState::Pending { hooks, .. } => hooks.len(),
            HookState::Fired(_) => 0,
        }
    }
}
