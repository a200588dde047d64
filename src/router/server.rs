//! hyper transport adapter: accepts TCP connections and turns each request
//! into an [`Engine::dispatch`] call, translating the populated
//! [`Context`] back into a real `hyper::Response`.
//!
//! Grounded on `psygo/psy.go`'s `Run`/`ServeHTTP` (`http.ListenAndServe`
//! plus the engine acting as the one `http.Handler`), adapted to hyper 1.x
//! the way the pack's other hyper-based services do (accept loop +
//! `service_fn` + `TokioIo`, e.g. the NLnetLabs `rtrtr` HTTP server).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use super::engine::Engine;

/// Serve `engine` on `addr` until the process is killed. Each accepted
/// connection is handled on its own task; one connection may carry
/// several keep-alive requests, each getting its own `Engine::dispatch`
/// call and so its own pooled `Context`.
pub async fn run(engine: Arc<Engine>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "router listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let engine = Arc::clone(&engine);
        tokio::task::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let engine = Arc::clone(&engine);
                async move { handle(engine, req).await }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

async fn handle(
    engine: Arc<Engine>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let headers = req
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = req
        .into_body()
        .collect()
        .await
        .map(|buf| buf.to_bytes().to_vec())
        .unwrap_or_default();

    let ctx = engine.dispatch(method, path, body, headers).await;

    let mut builder = Response::builder().status(ctx.writer.status.max(200).min(599) as u16);
    for (key, value) in &ctx.writer.headers {
        builder = builder.header(key, value);
    }
    let response = builder
        .body(Full::new(Bytes::from(ctx.writer.body.clone())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));

    engine.recycle(ctx);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::context::{handler_fn, Context};

    // `hyper::body::Incoming` has no public test constructor, so the
    // dispatch → response translation is exercised through
    // `Engine::dispatch` directly here; `tests/router.rs` drives the same
    // path over a real TCP connection.
    #[tokio::test]
    async fn dispatch_populates_a_renderable_context() {
        let engine = Engine::new();
        engine.root().get(
            "/hello",
            handler_fn(|cx: &mut Context| async move { cx.string(200, "hi") }),
        );

        let ctx = engine.dispatch("GET".into(), "/hello".into(), Vec::new(), Vec::new()).await;
        assert_eq!(ctx.writer.status, 200);
        assert_eq!(ctx.writer.body, b"hi");
        engine.recycle(ctx);
    }
}
