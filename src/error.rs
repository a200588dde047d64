//! Crate-wide error enum.
//!
//! Each subsystem owns its specific error type (`pool::error::PoolError`,
//! `rpc::error::RpcError`, `rpc::circuit_breaker::BreakerError<E>`); this
//! top-level enum exists for callers who want one `?`-able type across
//! subsystem boundaries instead of threading each one through by hand.

use thiserror::Error;

use crate::pool::error::PoolError;
use crate::rpc::error::RpcError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
