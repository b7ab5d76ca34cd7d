//! Caller-owned task scope.
//!
//! Tasks launched through a [`TaskScope`] race against the scope's
//! cancellation signal. Cancelling (or dropping) the scope aborts every task
//! still in flight; a task observes cancellation at its next suspension
//! point and publishes nothing afterwards.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// Cancellation scope for asynchronous actions.
#[derive(Debug)]
pub struct TaskScope {
    runtime: Handle,
    cancel: watch::Sender<bool>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl TaskScope {
    /// Creates a scope that launches tasks on the given runtime.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            runtime,
            cancel,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Creates a scope on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Returns a token that reports this scope's cancellation.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken(self.cancel.subscribe())
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Launches `task` in this scope.
    ///
    /// Returns `None` without running anything if the scope is already
    /// cancelled.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_cancelled() {
            debug!(task = name, "scope cancelled, task not launched");
            return None;
        }

        let mut token = self.token();
        let handle = self.runtime.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(task = name, "task cancelled");
                },
                () = task => {},
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle.abort_handle());
        Some(handle)
    }

    /// Number of launched tasks that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Cancels the scope and aborts all in-flight tasks. Idempotent.
    pub fn cancel(&self) {
        if self.cancel.send_replace(true) {
            return;
        }
        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        debug!(aborted = tasks.len(), "task scope cancelled");
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Read side of a scope's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// Returns `true` if the owning scope was cancelled or dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Completes when the owning scope is cancelled or dropped.
    pub async fn cancelled(&mut self) {
        // An error means the scope is gone, which counts as cancelled.
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn spawned_task_runs_to_completion() {
        let scope = TaskScope::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = scope
            .spawn("test", async move { flag.store(true, Ordering::SeqCst) })
            .expect("scope is live");
        handle.await.expect("task completes");
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(scope.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_in_flight_task() {
        let scope = TaskScope::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = scope
            .spawn("slow", async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .expect("scope is live");

        tokio::task::yield_now().await;
        scope.cancel();
        let _ = handle.await;
        assert!(!ran.load(Ordering::SeqCst));
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn spawn_after_cancel_is_refused() {
        let scope = TaskScope::current();
        scope.cancel();
        scope.cancel();
        assert!(scope.spawn("late", async {}).is_none());
    }

    #[tokio::test]
    async fn token_reports_dropped_scope_as_cancelled() {
        let scope = TaskScope::current();
        let token = scope.token();
        assert!(!token.is_cancelled());
        drop(scope);
        assert!(token.is_cancelled());
    }
}
