//! Errors surfaced across the worker pool boundary.

use thiserror::Error;

/// Returned by [`crate::pool::Pool::submit`] and the tuning operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,
    #[error("pool overloaded: no free worker, at capacity, and blocking is disallowed")]
    Overload,
    #[error("invalid pool size: {0}")]
    InvalidSize(i64),
}

/// Internal to [`crate::pool::queue`], never crosses the `Pool` API
/// boundary, callers only ever see [`PoolError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("worker queue is full")]
    Full,
    #[error("worker queue has been released")]
    Released,
}
