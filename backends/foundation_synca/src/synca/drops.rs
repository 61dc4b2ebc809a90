/// `RunOnDrop` runs its function when it goes out of scope, including
/// while unwinding from a panic, giving a scoped `defer`.
///
/// Waits use it to retire their registry slot on every exit path so a
/// predicate that panics never leaves a stale waiter behind.
pub struct RunOnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> RunOnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }

    /// Disarms the guard, the function will not run.
    pub fn dismiss(mut self) {
        self.0.take();
    }
}

impl<F: FnOnce()> Drop for RunOnDrop<F> {
    fn drop(&mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }
}
