#![cfg(feature = "tokio_runtime")]

use std::time;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::synca::{CancelSignal, Completion, RunOnDrop, WaitOutcome};

#[async_trait]
pub trait CompletionExt {
    /// Awaits the outcome without tying up a runtime thread.
    async fn recv_async(&self) -> WaitOutcome;

    /// Awaits the outcome for at most `timeout`, only abandoning interest
    /// when it passes.
    async fn recv_async_timeout(&self, timeout: time::Duration) -> Option<WaitOutcome>;
}

#[async_trait]
impl CompletionExt for Completion {
    async fn recv_async(&self) -> WaitOutcome {
        let (sender, receiver) = oneshot::channel();
        let hook = self.on_resolve(move |outcome| {
            let _ = sender.send(outcome);
        });

        // a dropped future takes its hook with it.
        let _unlink = RunOnDrop::new(move || {
            if let Some(id) = hook {
                self.remove_on_resolve(id);
            }
        });

        // the hook only goes away unfired if the completion can never resolve.
        receiver.await.unwrap_or(WaitOutcome::Cancelled)
    }

    async fn recv_async_timeout(&self, timeout: time::Duration) -> Option<WaitOutcome> {
        tokio::time::timeout(timeout, self.recv_async()).await.ok()
    }
}

#[async_trait]
pub trait CancelSignalExt {
    /// Resolves once the signal is cancelled.
    async fn cancelled(&self);
}

#[async_trait]
impl CancelSignalExt for CancelSignal {
    async fn cancelled(&self) {
        let (sender, receiver) = oneshot::channel();
        let hook = self.on_cancel(move || {
            let _ = sender.send(());
        });

        let _unlink = RunOnDrop::new(move || {
            if let Some(id) = hook {
                self.remove_on_cancel(id);
            }
        });
        let _ = receiver.await;
    }
}
