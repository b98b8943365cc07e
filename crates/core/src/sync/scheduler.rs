//! Delayed retry tasks
//!
//! One tokio timer per operation id. Scheduling again replaces the previous
//! timer, so an operation never has two retry tasks in flight. Timers carry
//! no state of their own: after a restart they are re-derived from the
//! stored `scheduled_for`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

type TaskEntry = (u64, JoinHandle<()>);

/// At most one delayed retry task per operation id
#[derive(Debug)]
pub struct RetryScheduler {
    tasks: Arc<DashMap<String, TaskEntry>>,
    generation: AtomicU64,
    cancel: CancellationToken,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Run `task` for `operation_id` after `delay`, replacing any earlier
    /// timer for the same id. Ignored after [`shutdown`](Self::shutdown).
    pub fn schedule<F>(&self, operation_id: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            trace!(operation_id, "scheduler stopped, retry not armed");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(operation_id, "no runtime, retry left to the next cycle");
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let cancel = self.cancel.clone();
        let id = operation_id.to_string();
        let (armed_tx, armed_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            // Wait until the entry is registered so removal below sees it
            let _ = armed_rx.await;
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            tasks.remove_if(&id, |_, (current, _)| *current == generation);
            task.await;
        });

        if let Some((_, (_, previous))) = self.tasks.remove(operation_id) {
            previous.abort();
        }
        self.tasks.insert(operation_id.to_string(), (generation, handle));
        let _ = armed_tx.send(());
        debug!(operation_id, delay_ms = delay.as_millis() as u64, "retry timer armed");
    }

    /// Drop a pending timer, if any
    pub fn cancel(&self, operation_id: &str) -> bool {
        match self.tasks.remove(operation_id) {
            Some((_, (_, handle))) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, operation_id: &str) -> bool {
        self.tasks.contains_key(operation_id)
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every timer and refuse new ones
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let ids: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.cancel(&id);
        }
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous_timer() {
        let scheduler = RetryScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            scheduler.schedule("op-1", Duration::from_secs(5), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled("op-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_timers() {
        let scheduler = RetryScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        scheduler.schedule("op-1", Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);

        scheduler.schedule("op-2", Duration::from_secs(1), async {});
        assert_eq!(scheduler.pending(), 0);
    }
}
