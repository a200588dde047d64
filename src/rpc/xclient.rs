//! The calling side of the RPC fabric: pick a server via [`Discovery`]
//! and dispatch through a caller-supplied transport.
//!
//! The RPC wire format itself (`psygo`'s gob-based `geerpc` protocol) is
//! out of scope; `XClient` is transport-agnostic instead, callers
//! provide the actual call as an async closure, matching how resilience
//! policies elsewhere (`CircuitBreakerPolicy::execute`,
//! `RetryPolicy::execute`) take the operation as a closure rather than
//! owning a concrete transport.

use std::future::Future;
use std::sync::Arc;

use super::discovery::{Discovery, SelectMode};
use crate::rpc::error::RpcError;

/// Calls a single resolved server address with a given request payload,
/// returning the caller's own error type on failure.
pub trait Transport<Req, Resp, E>: Send + Sync {
    fn call(&self, addr: &str, req: &Req) -> std::pin::Pin<Box<dyn Future<Output = Result<Resp, E>> + Send + '_>>;
}

/// Thin client over [`Discovery`]: refresh-if-stale, select one server,
/// dispatch. No cross-peer retry: broadcast is a separate opt-in
/// operation, not something `call` does implicitly.
pub struct XClient<T> {
    discovery: Arc<Discovery>,
    mode: SelectMode,
    transport: T,
}

impl<T> XClient<T> {
    pub fn new(discovery: Arc<Discovery>, mode: SelectMode, transport: T) -> Self {
        Self { discovery, mode, transport }
    }

    pub async fn call<Req, Resp, E>(&self, req: &Req) -> Result<Resp, XClientError<E>>
    where
        T: Transport<Req, Resp, E>,
    {
        let addr = self.discovery.select(self.mode).await.map_err(XClientError::Discovery)?;
        self.transport.call(&addr, req).await.map_err(XClientError::Transport)
    }

    /// Dispatch `req` to every currently known server, collecting each
    /// result independently. An explicit opt-in, separate from `call`'s
    /// single-server dispatch.
    pub async fn broadcast<Req, Resp, E>(&self, req: &Req) -> Result<Vec<Result<Resp, E>>, RpcError>
    where
        T: Transport<Req, Resp, E>,
    {
        self.discovery.refresh_if_stale().await?;
        let servers = self.discovery.servers_snapshot();
        if servers.is_empty() {
            return Err(RpcError::DiscoveryEmpty);
        }
        let mut results = Vec::with_capacity(servers.len());
        for addr in servers {
            results.push(self.transport.call(&addr, req).await);
        }
        Ok(results)
    }
}

#[derive(Debug)]
pub enum XClientError<E> {
    Discovery(RpcError),
    Transport(E),
}

impl<E: std::fmt::Display> std::fmt::Display for XClientError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery(e) => write!(f, "{e}"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for XClientError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Discovery(e) => Some(e),
            Self::Transport(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct CallError(String);
    impl std::fmt::Display for CallError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl std::error::Error for CallError {}

    struct EchoTransport {
        calls: Arc<AtomicUsize>,
    }

    impl Transport<String, String, CallError> for EchoTransport {
        fn call(&self, addr: &str, req: &String) -> std::pin::Pin<Box<dyn Future<Output = Result<String, CallError>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = format!("{addr}:{req}");
            Box::pin(async move { Ok(response) })
        }
    }

    #[tokio::test]
    async fn call_dispatches_to_the_selected_server() {
        let discovery = Arc::new(Discovery::new("http://127.0.0.1:9999/_rpc_/registry".parse().unwrap(), Duration::from_secs(3600)));
        discovery.set_servers(vec!["tcp@a:1".into()]);
        let calls = Arc::new(AtomicUsize::new(0));
        let client = XClient::new(discovery, SelectMode::RoundRobin, EchoTransport { calls: calls.clone() });

        let response = client.call(&"ping".to_string()).await.unwrap();
        assert_eq!(response, "tcp@a:1:ping");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn call_surfaces_discovery_empty() {
        let discovery = Arc::new(Discovery::new("http://127.0.0.1:9999/_rpc_/registry".parse().unwrap(), Duration::from_secs(3600)));
        let client = XClient::new(discovery, SelectMode::Random, EchoTransport { calls: Arc::new(AtomicUsize::new(0)) });

        let err = client.call(&"ping".to_string()).await.unwrap_err();
        assert!(matches!(err, XClientError::Discovery(RpcError::DiscoveryEmpty)));
    }
}
