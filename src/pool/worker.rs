//! A reusable execution worker: a one-slot task inbox plus the background
//! loop that drains it.
//!
//! Grounded on the source's `goWorker` (no single file captured it in the
//! retrieval pack, but `psygo/pool/worker_queue.go`'s `worker` interface,
//! `run`/`finish`/`lastUsedTime`/`inputFunc`/`inputParam`, names exactly
//! this shape). Translated to a bounded MPSC channel per worker in place
//! of a raw unbuffered Go channel plus a `sync.Pool`-allocated struct.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::clock::Clock;

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A handle to a running worker. Cheap to clone, clones share the same
/// one-slot inbox and `lastUsedAt` cell, they are not independent workers.
#[derive(Clone)]
pub struct Worker {
    inbox: mpsc::Sender<Option<Task>>,
    last_used_millis: Arc<AtomicU64>,
}

impl Worker {
    pub fn last_used_millis(&self) -> u64 {
        self.last_used_millis.load(Ordering::Relaxed)
    }

    /// Hand this worker its next task. Only the party currently holding
    /// this particular handle (the pool's free queue, or whoever just
    /// detached/spawned it) ever calls this, never two callers at once.
    pub async fn send_task(&self, task: Task) -> Result<(), Task> {
        self.inbox.send(Some(task)).await.map_err(|e| e.0.expect("always Some on send"))
    }

    /// Ask an idle worker to stop. Non-blocking: the one-slot inbox is
    /// empty whenever a worker is idle (in the free queue), so `try_send`
    /// always succeeds there.
    pub fn request_shutdown(&self) {
        let _ = self.inbox.try_send(None);
    }

    /// Spawn a worker's background execution loop on the current Tokio
    /// runtime. `on_idle` runs after every completed task with a fresh
    /// handle to this same worker: returning `true` means the handle was
    /// accepted back by the pool (free queue) and the loop keeps waiting
    /// for its next task; `false` means the pool has released this worker
    /// (queue full, or the pool is closing) and the loop should terminate.
    pub fn spawn(clock: Arc<dyn Clock>, on_idle: impl Fn(Worker) -> bool + Send + Sync + 'static) -> Worker {
        let (tx, mut rx) = mpsc::channel::<Option<Task>>(1);
        let last_used_millis = Arc::new(AtomicU64::new(clock.now_millis()));

        let loop_inbox = tx.clone();
        let loop_last_used = last_used_millis.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Some(Some(task)) => {
                        task.await;
                        loop_last_used.store(clock.now_millis(), Ordering::Relaxed);
                        let self_handle =
                            Worker { inbox: loop_inbox.clone(), last_used_millis: loop_last_used.clone() };
                        if !on_idle(self_handle) {
                            break;
                        }
                    }
                    Some(None) | None => break,
                }
            }
        });

        Worker { inbox: tx, last_used_millis }
    }

    #[cfg(test)]
    pub fn test_handle(last_used_millis: Arc<AtomicU64>) -> Worker {
        let (inbox, _unused_rx) = mpsc::channel(1);
        Worker { inbox, last_used_millis }
    }
}
