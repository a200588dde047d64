//! Periodic server-list discovery with pluggable selection.
//!
//! `psygo`'s discovery/xclient pair lives in `psygo/rpc/xclient`, but
//! that file isn't part of the retrieval pack, so this is built in the
//! idiom the rest of `rpc` already established: a `Mutex`-guarded
//! snapshot refreshed over HTTP, a `Clock` for testable staleness checks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::clock::{Clock, MonotonicClock};
use crate::rpc::error::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Random,
    RoundRobin,
}

struct Snapshot {
    servers: Vec<String>,
    last_update_millis: u64,
}

/// Periodically refreshed view of a [`super::registry::Registry`]'s
/// alive-server list, with a server-selection policy layered on top.
pub struct Discovery {
    registry_url: hyper::Uri,
    refresh_interval: Duration,
    snapshot: Mutex<Snapshot>,
    round_robin_counter: AtomicUsize,
    client: Client<HttpConnector, Full<Bytes>>,
    clock: Arc<dyn Clock>,
}

impl Discovery {
    pub fn new(registry_url: hyper::Uri, refresh_interval: Duration) -> Self {
        Self::with_clock(registry_url, refresh_interval, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(registry_url: hyper::Uri, refresh_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry_url,
            refresh_interval,
            snapshot: Mutex::new(Snapshot { servers: Vec::new(), last_update_millis: 0 }),
            round_robin_counter: AtomicUsize::new(0),
            client: Client::builder(TokioExecutor::new()).build_http(),
            clock,
        }
    }

    /// Current server list snapshot, without triggering a refresh.
    pub fn servers_snapshot(&self) -> Vec<String> {
        self.snapshot.lock().expect("discovery mutex poisoned").servers.clone()
    }

    /// Seed (or overwrite) the server list directly, bypassing the HTTP
    /// refresh, used by callers wiring up tests or a static topology.
    pub fn set_servers(&self, servers: Vec<String>) {
        let mut snapshot = self.snapshot.lock().expect("discovery mutex poisoned");
        snapshot.servers = servers;
        snapshot.last_update_millis = self.clock.now_millis();
    }

    /// `GET` the registry and replace the server list under lock.
    pub async fn refresh(&self) -> Result<(), RpcError> {
        let request = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(self.registry_url.clone())
            .body(Full::new(Bytes::new()))
            .expect("static request is well-formed");

        let response = self.client.request(request).await.map_err(|err| RpcError::DiscoveryRefreshFailed(err.to_string()))?;
        let servers = response
            .headers()
            .get("X-rpc-Servers")
            .and_then(|v| v.to_str().ok())
            .map(|csv| csv.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        self.set_servers(servers);
        Ok(())
    }

    /// Refresh if the last successful refresh is older than
    /// `refresh_interval`.
    pub async fn refresh_if_stale(&self) -> Result<(), RpcError> {
        let now = self.clock.now_millis();
        let is_stale = {
            let snapshot = self.snapshot.lock().expect("discovery mutex poisoned");
            now.saturating_sub(snapshot.last_update_millis) > self.refresh_interval.as_millis() as u64
        };
        if is_stale {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    /// Pick one server using `mode`. Always refreshes first if the
    /// snapshot is stale.
    pub async fn select(&self, mode: SelectMode) -> Result<String, RpcError> {
        self.refresh_if_stale().await?;
        let servers = self.snapshot.lock().expect("discovery mutex poisoned").servers.clone();
        if servers.is_empty() {
            return Err(RpcError::DiscoveryEmpty);
        }
        match mode {
            SelectMode::Random => {
                let index = (rand::random::<u32>() as usize) % servers.len();
                Ok(servers[index].clone())
            }
            SelectMode::RoundRobin => {
                let index = self.round_robin_counter.fetch_add(1, Ordering::Relaxed) % servers.len();
                Ok(servers[index].clone())
            }
        }
    }
}
