//! A structured concurrency scope on top of [`JoinSet`].
//!
//! Every task spawned into a [`Scope`] receives a [`CancelToken`] from it and
//! is expected to return promptly once the token fires. Closing the scope
//! cancels all tasks and waits for each of them, so nothing spawned into a
//! scope outlives it.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, trace};

/// Cooperative cancellation handed to the tasks of one scope.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolve once the owning scope is cancelled or gone.
    pub async fn cancelled(&mut self) {
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

/// A set of sibling tasks that are cancelled and joined together.
#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    tasks: JoinSet<()>,
    cancel: watch::Sender<bool>,
}

impl Scope {
    pub fn new(name: &'static str) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            name,
            tasks: JoinSet::new(),
            cancel,
        }
    }

    /// A token that fires when this scope is cancelled.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.cancel.subscribe(),
        }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Ask every task to unwind. Does not wait.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Number of tasks not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Collect tasks that already finished, without waiting.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_exit(self.name, result);
        }
    }

    /// Wait until any task exits, then cancel and join the rest.
    pub async fn join_first(mut self) {
        if let Some(result) = self.tasks.join_next().await {
            log_exit(self.name, result);
        }
        self.close().await;
    }

    /// Cancel every task and wait for all of them.
    pub async fn close(mut self) {
        self.cancel();
        while let Some(result) = self.tasks.join_next().await {
            log_exit(self.name, result);
        }
        debug!(scope = self.name, "Scope closed");
    }
}

fn log_exit(scope: &str, result: Result<(), JoinError>) {
    match result {
        Ok(()) => trace!(scope, "Task finished"),
        Err(err) if err.is_panic() => error!(scope, "Task panicked: {err}"),
        Err(err) => debug!(scope, "Task aborted: {err}"),
    }
}
