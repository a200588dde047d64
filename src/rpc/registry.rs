//! The in-process, HTTP-addressable service registry.
//!
//! Direct translation of `psygo/rpc/registry/registry.go`'s `Registry`:
//! same wire protocol (`POST`/`GET` on one path, `X-rpc-Server` /
//! `X-rpc-Servers` headers), same GC-on-read aliveness check, same
//! default five-minute timeout. The HTTP adapter follows
//! [`crate::router::server`]'s accept-loop-plus-`service_fn` shape.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::clock::{Clock, MonotonicClock};

pub const DEFAULT_PATH: &str = "/_rpc_/registry";
pub(crate) const SERVER_HEADER: &str = "X-rpc-Server";
const SERVERS_HEADER: &str = "X-rpc-Servers";

struct ServerItem {
    start_millis: u64,
}

/// `addr -> ServerItem{addr, start}`, guarded by one mutex, the read
/// path (`alive_servers`) purges expired entries under the same lock it
/// reads with, matching the source's `aliveServers`.
pub struct Registry {
    timeout: Duration,
    servers: Mutex<HashMap<String, ServerItem>>,
    clock: Arc<dyn Clock>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

impl Registry {
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(timeout, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { timeout, servers: Mutex::new(HashMap::new()), clock }
    }

    /// Register `addr`, or refresh its `start` time if already present.
    pub fn put_server(&self, addr: &str) {
        let now = self.clock.now_millis();
        let mut servers = self.servers.lock().expect("registry mutex poisoned");
        servers.entry(addr.to_string()).and_modify(|s| s.start_millis = now).or_insert(ServerItem { start_millis: now });
    }

    /// Alive addrs, sorted ascending. Entries past `timeout` are dropped
    /// under the same lock: the GET also garbage-collects dead entries,
    /// there is no separate background sweep.
    pub fn alive_servers(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let timeout_millis = self.timeout.as_millis() as u64;
        let mut servers = self.servers.lock().expect("registry mutex poisoned");
        servers.retain(|_, item| timeout_millis == 0 || item.start_millis + timeout_millis > now);
        let mut alive: Vec<String> = servers.keys().cloned().collect();
        alive.sort();
        alive
    }
}

/// Route one request through the registry's wire protocol. Kept
/// independent of `hyper::body::Incoming` so it can be unit-tested
/// directly, the same split `router::server` uses.
pub fn handle_request(registry: &Registry, method: &Method, headers: &HeaderMap) -> Response<Full<Bytes>> {
    match *method {
        Method::GET => {
            let csv = registry.alive_servers().join(",");
            let mut builder = Response::builder().status(StatusCode::OK);
            if let Ok(value) = HeaderValue::from_str(&csv) {
                builder = builder.header(SERVERS_HEADER, value);
            }
            builder.body(Full::new(Bytes::new())).expect("static response is well-formed")
        }
        Method::POST => match headers.get(SERVER_HEADER).and_then(|v| v.to_str().ok()) {
            Some(addr) if !addr.is_empty() => {
                registry.put_server(addr);
                Response::builder().status(StatusCode::OK).body(Full::new(Bytes::new())).expect("static response is well-formed")
            }
            _ => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::new()))
                .expect("static response is well-formed"),
        },
        _ => Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::new(Bytes::new()))
            .expect("static response is well-formed"),
    }
}

/// Serve `registry` at `addr` over plain HTTP/1.1 until the process is
/// killed. The Rust analogue of `HandleHTTP` plus `http.ListenAndServe`.
pub async fn run(registry: Arc<Registry>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, path = DEFAULT_PATH, "rpc registry listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        tokio::task::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<Incoming>| {
                let registry = Arc::clone(&registry);
                async move { Ok::<_, Infallible>(handle_request(&registry, req.method(), req.headers())) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %err, "registry connection closed with error");
            }
        });
    }
}
