//! Fixed-capacity circular FIFO of idle workers with an O(log n) expiry
//! scan.
//!
//! Direct translation of `psygo/pool/worker_loop_queue.go`'s `loopQueue`:
//! physically circular, logically sorted by `lastUsedAt` non-decreasing
//! from `head` forward, because `insert` only ever appends the
//! most-recently-used worker. Preserve that invariant; see
//! `Node::binary_search` below.

use super::worker::Worker;
use crate::pool::error::QueueError;

pub struct LoopQueue {
    items: Vec<Option<Worker>>,
    head: usize,
    tail: usize,
    size: usize,
    is_full: bool,
}

impl LoopQueue {
    pub fn new(size: usize) -> Self {
        let mut items = Vec::with_capacity(size);
        items.resize_with(size, || None);
        Self { items, head: 0, tail: 0, size, is_full: false }
    }

    pub fn len(&self) -> usize {
        if self.size == 0 || self.is_empty() {
            return 0;
        }
        if self.head == self.tail && self.is_full {
            return self.size;
        }
        if self.tail > self.head {
            self.tail - self.head
        } else {
            self.size - self.head + self.tail
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail && !self.is_full
    }

    /// Insert an idle worker. `O(1)`.
    pub fn insert(&mut self, worker: Worker) -> Result<(), QueueError> {
        if self.size == 0 {
            return Err(QueueError::Released);
        }
        if self.is_full {
            return Err(QueueError::Full);
        }
        self.items[self.tail] = Some(worker);
        self.tail = (self.tail + 1) % self.size;
        if self.tail == self.head {
            self.is_full = true;
        }
        Ok(())
    }

    /// Detach the oldest idle worker. `O(1)`.
    pub fn detach(&mut self) -> Option<Worker> {
        if self.is_empty() {
            return None;
        }
        let worker = self.items[self.head].take();
        self.head = (self.head + 1) % self.size;
        self.is_full = false;
        worker
    }

    /// Return all workers idle longer than `duration` (as measured against
    /// `now_millis`), removing them from the queue. `O(log n)` via binary
    /// search over the logically-sorted view, matching the source's
    /// `binarySearch`.
    pub fn refresh(&mut self, now_millis: u64, duration_millis: u64) -> Vec<Worker> {
        let Some(expiry_index) = self.binary_search(now_millis.saturating_sub(duration_millis)) else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        if self.head <= expiry_index {
            for slot in &mut self.items[self.head..=expiry_index] {
                if let Some(w) = slot.take() {
                    expired.push(w);
                }
            }
        } else {
            for slot in &mut self.items[0..=expiry_index] {
                if let Some(w) = slot.take() {
                    expired.push(w);
                }
            }
            for slot in &mut self.items[self.head..self.size] {
                if let Some(w) = slot.take() {
                    expired.push(w);
                }
            }
        }

        self.head = (expiry_index + 1) % self.size;
        if !expired.is_empty() {
            self.is_full = false;
        }
        expired
    }

    /// Index (in physical coordinates) of the last worker whose
    /// `last_used_millis()` is `<= expiry_millis`, or `None` if even the
    /// oldest (head) worker hasn't expired yet.
    fn binary_search(&self, expiry_millis: u64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let head_worker = self.items[self.head].as_ref().expect("head slot occupied when non-empty");
        if head_worker.last_used_millis() > expiry_millis {
            return None;
        }

        let nlen = self.size;
        let base = self.head;
        let r_logical = (self.tail as i64 - 1 - self.head as i64 + nlen as i64) % nlen as i64;
        let mut l: i64 = 0;
        let mut r: i64 = r_logical;
        while l <= r {
            let mid = l + ((r - l) >> 1);
            let true_mid = ((mid + base as i64).rem_euclid(nlen as i64)) as usize;
            let worker = self.items[true_mid].as_ref().expect("logically occupied slot");
            if worker.last_used_millis() > expiry_millis {
                r = mid - 1;
            } else {
                l = mid + 1;
            }
        }
        Some(((r + base as i64).rem_euclid(nlen as i64)) as usize)
    }

    /// Drain and finish every idle worker, then release the backing
    /// storage. Called once from `Pool::release`.
    pub fn reset(&mut self) -> Vec<Worker> {
        let mut drained = Vec::new();
        while let Some(w) = self.detach() {
            drained.push(w);
        }
        self.items.clear();
        self.size = 0;
        self.head = 0;
        self.tail = 0;
        self.is_full = false;
        drained
    }
}
