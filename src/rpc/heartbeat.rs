//! Server-side heartbeat helper: register with a [`super::registry::Registry`]
//! and keep re-registering on a ticker until a transport error gives up.
//!
//! Grounded on `psygo/rpc/registry/registry.go`'s `Heartbeat`/`sendHeartbeat`:
//! the first send happens synchronously (so registration fails loudly if
//! the registry is unreachable at startup), then a background ticker
//! resends every `duration`, defaulting to `timeout - 1 min`.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::registry::{DEFAULT_PATH, SERVER_HEADER};
use crate::rpc::error::RpcError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub async fn send_heartbeat(client: &Client<HttpConnector, Full<Bytes>>, registry_url: &Uri, addr: &str) -> Result<(), RpcError> {
    tracing::info!(%addr, %registry_url, "sending heartbeat to registry");
    let request = Request::builder()
        .method(Method::POST)
        .uri(registry_url.clone())
        .header(SERVER_HEADER, addr)
        .body(Full::new(Bytes::new()))
        .expect("static request is well-formed");

    client
        .request(request)
        .await
        .map(|_| ())
        .map_err(|err| RpcError::DiscoveryRefreshFailed(err.to_string()))
}

/// Register `addr` once, then keep sending heartbeats every `duration`
/// (or `timeout - 1 min` when `duration` is `None`) until a transport
/// error occurs, matching the source's "a transport error stops the
/// ticker" contract. The next registry `GET` evicts the now-silent
/// entry once its TTL lapses.
pub async fn start(registry_url: Uri, addr: String, duration: Option<Duration>, timeout: Duration) -> Result<tokio::task::JoinHandle<()>, RpcError> {
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();
    send_heartbeat(&client, &registry_url, &addr).await?;

    let interval = duration.unwrap_or_else(|| {
        let timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        timeout.saturating_sub(Duration::from_secs(60))
    });

    Ok(tokio::task::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; the initial send above already happened
        loop {
            ticker.tick().await;
            if send_heartbeat(&client, &registry_url, &addr).await.is_err() {
                tracing::warn!(%addr, "heartbeat failed, stopping ticker");
                return;
            }
        }
    }))
}

pub fn default_registry_path() -> &'static str {
    DEFAULT_PATH
}
