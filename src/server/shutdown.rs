//! Shutdown signalling between the controller and the serving task.
//!
//! Triggering and dropping the controller's end are equivalent: both wake
//! the server side, which treats either as the end of its input.

use tokio::sync::watch;

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Controller side.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Safe to call from any thread or runtime.
    pub fn trigger(self) {
        let _ = self.tx.send(true);
    }
}

/// Server side.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve on a shutdown request or when the trigger is dropped.
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
