//! Errors surfaced by the RPC resilience fabric (registry, discovery,
//! xclient, rate limiter). The circuit breaker's own error stays generic
//! over the caller's inner error type and lives in
//! [`crate::rpc::circuit_breaker::BreakerError`] instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("registry request missing X-rpc-Server header")]
    RegistryMissingHeader,
    #[error("registry method not allowed")]
    RegistryMethodNotAllowed,
    #[error("discovery has no known servers")]
    DiscoveryEmpty,
    #[error("discovery refresh failed: {0}")]
    DiscoveryRefreshFailed(String),
    #[error("rate limited: wait {0:?} and retry")]
    RateLimited(std::time::Duration),
}
