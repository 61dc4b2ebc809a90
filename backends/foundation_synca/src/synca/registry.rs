// Implements the waiter registry used by `Event` to hand out wake tokens.

use std::collections::{HashMap, VecDeque};

pub(crate) type WaiterId = u64;

/// `SlotState` is the state of a single in-flight wait operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// The waiter holds the lock and is evaluating its condition.
    Running,

    /// The waiter sits in the wake queue. Freshly enrolled waiters start
    /// here, before their thread ever blocks.
    Parked,

    /// A notifier picked this waiter, it has not yet observed it.
    /// `handoff` is set for wake-one wakes, which must reach some other
    /// waiter if this one retires without consuming it.
    Woken { handoff: bool },

    /// The wait was cancelled from the outside and must retire.
    Cancelled,
}

/// `WaiterRegistry` tracks every wait operation currently running against
/// one notification path.
///
/// Each operation is enrolled once and keeps its id across every round of a
/// guarded wait. A waiter is eligible for wakes from the moment it is
/// enrolled, so a notification issued after a wait call registered can not
/// be missed while its thread is still on the way to blocking. Waiters that
/// enroll after a notification never see it.
///
/// The queue holds exactly the ids whose slot is [`SlotState::Parked`], in
/// parking order, so `wake_one` hands wakes out first-come first-served.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    next_id: WaiterId,
    slots: HashMap<WaiterId, SlotState>,
    queue: VecDeque<WaiterId>,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enrolls a new wait operation, queued and ready to receive wakes.
    pub(crate) fn enroll(&mut self) -> WaiterId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.slots.insert(id, SlotState::Parked);
        self.queue.push_back(id);
        id
    }

    pub(crate) fn state(&self, id: WaiterId) -> Option<SlotState> {
        self.slots.get(&id).copied()
    }

    /// Makes sure the waiter is queued before it blocks.
    ///
    /// Returns `Parked` when the waiter may block, a `Woken` state when a
    /// wake already arrived (it is consumed and the waiter is running
    /// again), and `Cancelled` or `None` when the waiter must retire.
    pub(crate) fn park(&mut self, id: WaiterId) -> Option<SlotState> {
        let slot = self.slots.get_mut(&id)?;
        let current = *slot;
        match current {
            SlotState::Running => {
                *slot = SlotState::Parked;
                self.queue.push_back(id);
                Some(SlotState::Parked)
            }
            SlotState::Woken { .. } => {
                *slot = SlotState::Running;
                Some(current)
            }
            SlotState::Parked | SlotState::Cancelled => Some(current),
        }
    }

    /// Wakes the longest queued waiter, returns false when nobody was queued.
    pub(crate) fn wake_one(&mut self) -> bool {
        while let Some(id) = self.queue.pop_front() {
            if let Some(slot) = self.slots.get_mut(&id) {
                if *slot == SlotState::Parked {
                    *slot = SlotState::Woken { handoff: true };
                    return true;
                }
            }
        }
        false
    }

    /// Wakes every queued waiter returning how many were woken.
    pub(crate) fn wake_all(&mut self) -> usize {
        let mut woken = 0;
        for id in self.queue.drain(..) {
            if let Some(slot) = self.slots.get_mut(&id) {
                if *slot == SlotState::Parked {
                    *slot = SlotState::Woken { handoff: false };
                    woken += 1;
                }
            }
        }
        woken
    }

    /// Marks a waiter as cancelled, returning the state it was in.
    ///
    /// Returns `None` if the waiter already left or was already cancelled.
    pub(crate) fn cancel(&mut self, id: WaiterId) -> Option<SlotState> {
        let slot = self.slots.get_mut(&id)?;
        let previous = *slot;
        match previous {
            SlotState::Cancelled => None,
            SlotState::Parked => {
                *slot = SlotState::Cancelled;
                self.queue.retain(|queued| *queued != id);
                Some(previous)
            }
            SlotState::Running | SlotState::Woken { .. } => {
                *slot = SlotState::Cancelled;
                Some(previous)
            }
        }
    }

    /// Consumes a pending wake for the waiter.
    ///
    /// A woken waiter goes back to running and its `Woken` state is
    /// returned, every other state is returned untouched so the caller can
    /// tell a spurious wakeup (still `Parked`) from a cancellation.
    pub(crate) fn take_wake(&mut self, id: WaiterId) -> Option<SlotState> {
        let slot = self.slots.get_mut(&id)?;
        let current = *slot;
        if let SlotState::Woken { .. } = current {
            *slot = SlotState::Running;
        }
        Some(current)
    }

    /// Removes the waiter entirely, wherever it currently is, returning the
    /// state it left in.
    pub(crate) fn leave(&mut self, id: WaiterId) -> Option<SlotState> {
        let last = self.slots.remove(&id);
        if last == Some(SlotState::Parked) {
            self.queue.retain(|queued| *queued != id);
        }
        last
    }

    /// Number of wait operations currently enrolled.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of waiters currently queued for a wake.
    pub(crate) fn parked(&self) -> usize {
        self.queue.len()
    }
}
