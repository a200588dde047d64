//! The bounded, expiry-aware worker pool.
//!
//! Grounded on `psygo/pool`'s `Pool` admission algorithm and janitor.
//! The one deliberate translation: Go's `sync.Cond` becomes a
//! `tokio::sync::Notify` plus an explicit `blocking_waiters` counter,
//! since `Notify` has no built-in waiter count and the admission
//! algorithm needs one to enforce `max_blocking_tasks`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use super::error::PoolError;
use super::queue::LoopQueue;
use super::worker::{Task, Worker};
use crate::clock::{Clock, MonotonicClock};

/// Sizing and policy knobs for a [`Pool`], mirroring [`crate::config::PoolSettings`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub capacity: usize,
    pub expiry: Duration,
    pub non_blocking: bool,
    pub max_blocking_tasks: usize,
    pub pre_alloc: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 256, expiry: Duration::from_secs(10), non_blocking: false, max_blocking_tasks: 0, pre_alloc: false }
    }
}

impl From<&crate::config::PoolSettings> for PoolConfig {
    fn from(settings: &crate::config::PoolSettings) -> Self {
        Self {
            capacity: settings.capacity,
            expiry: settings.expiry(),
            non_blocking: settings.non_blocking,
            max_blocking_tasks: settings.max_blocking_tasks,
            pre_alloc: settings.pre_alloc,
        }
    }
}

struct PoolState {
    queue: Mutex<LoopQueue>,
    capacity: AtomicUsize,
    running: AtomicUsize,
    blocking_waiters: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,
    non_blocking: bool,
    max_blocking_tasks: usize,
    clock: Arc<dyn Clock>,
}

/// A bounded pool of reusable async task runners.
///
/// Cloning a `Pool` shares the same underlying state: it is a thin `Arc`
/// wrapper, preferring explicit `Arc`-based sharing over hidden interior
/// mutability behind a bare struct.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolState>,
    janitor: Arc<tokio::task::JoinHandle<()>>,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        if config.capacity == 0 {
            return Err(PoolError::InvalidSize(0));
        }
        Self::with_clock(config, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Self, PoolError> {
        if config.capacity == 0 {
            return Err(PoolError::InvalidSize(0));
        }

        let inner = Arc::new(PoolState {
            queue: Mutex::new(LoopQueue::new(config.capacity)),
            capacity: AtomicUsize::new(config.capacity),
            running: AtomicUsize::new(0),
            blocking_waiters: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            non_blocking: config.non_blocking,
            max_blocking_tasks: config.max_blocking_tasks,
            clock,
        });

        if config.pre_alloc {
            for _ in 0..config.capacity {
                let worker = spawn_worker(&inner);
                inner.queue.lock().expect("pool mutex poisoned").insert(worker).expect("fresh queue has room");
                inner.running.fetch_add(1, Ordering::AcqRel);
            }
        }

        let janitor = Arc::new(spawn_janitor(inner.clone(), config.expiry));
        Ok(Self { inner, janitor })
    }

    /// Submit a task for execution on some worker, following the
    /// admission algorithm exactly: reuse an idle worker, else spawn if
    /// under capacity, else block or overload depending on policy.
    pub async fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let boxed: Task = Box::pin(task);
        self.submit_boxed(boxed).await
    }

    async fn submit_boxed(&self, mut task: Task) -> Result<(), PoolError> {
        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }

            // Step 2: hand off to an already-idle worker.
            let free = self.inner.queue.lock().expect("pool mutex poisoned").detach();
            if let Some(worker) = free {
                match worker.send_task(task).await {
                    Ok(()) => return Ok(()),
                    Err(returned) => {
                        // Worker raced us into shutdown between detach and
                        // send; it is not coming back, retry admission.
                        task = returned;
                        continue;
                    }
                }
            }

            // Step 3: spawn fresh capacity if there's room.
            let capacity = self.inner.capacity.load(Ordering::Acquire);
            let reserved = self
                .inner
                .running
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |running| {
                    if running < capacity { Some(running + 1) } else { None }
                });
            if reserved.is_ok() {
                let worker = spawn_worker(&self.inner);
                return match worker.send_task(task).await {
                    Ok(()) => Ok(()),
                    Err(_) => Err(PoolError::Closed),
                };
            }

            // Step 4: at capacity, overload or block.
            if self.inner.non_blocking {
                return Err(PoolError::Overload);
            }
            let max_waiters = self.inner.max_blocking_tasks;
            if max_waiters > 0 && self.inner.blocking_waiters.load(Ordering::Acquire) >= max_waiters {
                return Err(PoolError::Overload);
            }

            self.inner.blocking_waiters.fetch_add(1, Ordering::AcqRel);
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().await;
            self.inner.blocking_waiters.fetch_sub(1, Ordering::AcqRel);

            if self.inner.closed.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }
            // retry from step 2
        }
    }

    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn free(&self) -> usize {
        self.inner.queue.lock().expect("pool mutex poisoned").len()
    }

    pub fn cap(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// Change the advertised capacity. Workers in excess of the new
    /// capacity are not forcibly killed: they exit naturally through
    /// expiry or the next time the queue rejects their return.
    pub fn tune(&self, new_capacity: usize) -> Result<(), PoolError> {
        if new_capacity == 0 {
            return Err(PoolError::InvalidSize(0));
        }
        self.inner.capacity.store(new_capacity, Ordering::Release);
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Close the pool: wake every blocked submitter with `PoolClosed`,
    /// and shut down every currently idle worker. Workers mid-task finish
    /// their task and then observe `closed` on their own attempt to
    /// re-enter the queue.
    pub fn release(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained = self.inner.queue.lock().expect("pool mutex poisoned").reset();
        for worker in drained {
            worker.request_shutdown();
        }
        self.inner.notify.notify_waiters();
    }

    /// Reopen a previously released pool at `capacity`. Any workers still
    /// winding down from the prior `release()` finish independently; they
    /// do not rejoin this incarnation's queue (open question recorded in
    /// DESIGN.md: unlike the source's in-place `isClosed` flip, this pool
    /// treats `reboot` as a genuinely fresh generation to avoid racing a
    /// slow-to-exit worker against a just-reopened queue).
    pub fn reboot(&mut self, capacity: usize) -> Result<(), PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidSize(0));
        }
        self.janitor.abort();
        let fresh = Pool::with_clock(
            PoolConfig { capacity, expiry: Duration::from_millis(0), non_blocking: self.inner.non_blocking, max_blocking_tasks: self.inner.max_blocking_tasks, pre_alloc: false },
            self.inner.clock.clone(),
        )?;
        *self = fresh;
        Ok(())
    }
}

fn spawn_worker(inner: &Arc<PoolState>) -> Worker {
    let state = inner.clone();
    Worker::spawn(inner.clock.clone(), move |worker| {
        if state.closed.load(Ordering::Acquire) {
            state.running.fetch_sub(1, Ordering::AcqRel);
            state.notify.notify_waiters();
            return false;
        }
        match state.queue.lock().expect("pool mutex poisoned").insert(worker) {
            Ok(()) => {
                state.notify.notify_one();
                true
            }
            Err(_) => {
                state.running.fetch_sub(1, Ordering::AcqRel);
                state.notify.notify_waiters();
                false
            }
        }
    })
}

fn spawn_janitor(inner: Arc<PoolState>, expiry: Duration) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn(async move {
        if expiry.is_zero() {
            return;
        }
        let mut ticker = tokio::time::interval(expiry);
        loop {
            ticker.tick().await;
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            let now = inner.clock.now_millis();
            let expired = {
                let mut queue = inner.queue.lock().expect("pool mutex poisoned");
                queue.refresh(now, expiry.as_millis() as u64)
            };
            for worker in expired {
                worker.request_shutdown();
            }
            if inner.running.load(Ordering::Acquire) == 0 {
                inner.notify.notify_waiters();
            }
        }
    })
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Only the last live handle tears the janitor down; cloned `Pool`s
        // share one `Arc<JoinHandle>` so this only fires once.
        if Arc::strong_count(&self.janitor) == 1 {
            self.janitor.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn submits_and_runs_a_task() {
        let pool = Pool::new(PoolConfig { capacity: 2, expiry: StdDuration::from_secs(60), ..Default::default() }).unwrap();
        let done = Arc::new(StdAtomicUsize::new(0));
        let d = done.clone();
        pool.submit(async move { d.fetch_add(1, Ordering::SeqCst); }).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        pool.release();
    }

    #[tokio::test]
    async fn s3_blocks_at_capacity_and_runs_every_task() {
        let pool = Pool::new(PoolConfig { capacity: 2, expiry: StdDuration::from_secs(60), non_blocking: false, ..Default::default() }).unwrap();
        let counter = Arc::new(StdAtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                pool.submit(async move {
                    tokio::time::sleep(StdDuration::from_millis(30)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        pool.release();
    }

    #[tokio::test]
    async fn s4_nonblocking_overloads_past_capacity() {
        let pool = Pool::new(PoolConfig { capacity: 2, expiry: StdDuration::from_secs(60), non_blocking: true, ..Default::default() }).unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut results = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            results.push(pool.submit(async move { gate.notified().await; }).await);
        }
        assert!(results.iter().any(|r| matches!(r, Err(PoolError::Overload))));
        gate.notify_waiters();
        pool.release();
    }

    #[tokio::test]
    async fn submit_after_release_is_closed() {
        let pool = Pool::new(PoolConfig { capacity: 1, expiry: StdDuration::from_secs(60), ..Default::default() }).unwrap();
        pool.release();
        let result = pool.submit(async {}).await;
        assert_eq!(result, Err(PoolError::Closed));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Pool::new(PoolConfig { capacity: 0, ..Default::default() }).unwrap_err();
        assert_eq!(err, PoolError::InvalidSize(0));
    }
}
