//! The bounded, expiry-aware worker pool: admission, the idle-worker
//! queue, and the reusable worker task itself.

pub mod error;
pub mod pool;
pub mod queue;
pub mod worker;

pub use error::{PoolError, QueueError};
pub use pool::{Pool, PoolConfig};
pub use worker::{Task, Worker};
