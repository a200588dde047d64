//! End-to-end router tests driven over a real TCP connection, the
//! scenarios this crate's unit tests exercise through `Engine::dispatch`
//! directly (faster, no sockets), repeated here the way the scenario
//! actually runs in production: through `router::server::run`.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use psyrs::router::context::{handler_fn, Context};
use psyrs::router::{server, Engine};

async fn spawn_server(engine: std::sync::Arc<Engine>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // server::run binds its own listener; free the port first
    tokio::spawn(server::run(engine, addr));
    tokio::time::sleep(Duration::from_millis(30)).await;
    addr
}

fn client() -> Client<HttpConnector, Full<Bytes>> {
    Client::builder(TokioExecutor::new()).build_http()
}

async fn get(client: &Client<HttpConnector, Full<Bytes>>, uri: hyper::Uri) -> hyper::Response<hyper::body::Incoming> {
    let request = hyper::Request::builder().method(hyper::Method::GET).uri(uri).body(Full::new(Bytes::new())).unwrap();
    client.request(request).await.unwrap()
}

#[tokio::test]
async fn s1_route_params_over_http() {
    let engine = Engine::with_defaults();
    engine.root().get(
        "/p/:lang/doc",
        handler_fn(|cx: &mut Context| async move {
            let lang = cx.param("lang").unwrap_or_default().to_string();
            cx.string(200, lang);
        }),
    );
    let addr = spawn_server(engine).await;

    let c = client();
    let uri: hyper::Uri = format!("http://{addr}/p/rust/doc").parse().unwrap();
    let response = get(&c, uri).await;
    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"rust");
}

#[tokio::test]
async fn s2_catch_all_over_http() {
    let engine = Engine::with_defaults();
    engine.root().get(
        "/assets/*filepath",
        handler_fn(|cx: &mut Context| async move {
            let path = cx.param("filepath").unwrap_or_default().to_string();
            cx.string(200, path);
        }),
    );
    let addr = spawn_server(engine).await;

    let c = client();
    let uri: hyper::Uri = format!("http://{addr}/assets/js/app.js").parse().unwrap();
    let response = get(&c, uri).await;
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"js/app.js");
}

#[tokio::test]
async fn unmatched_route_is_404_over_http() {
    let engine = Engine::with_defaults();
    let addr = spawn_server(engine).await;

    let c = client();
    let uri: hyper::Uri = format!("http://{addr}/nope").parse().unwrap();
    let response = get(&c, uri).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn recovery_middleware_turns_a_panic_into_500() {
    let engine = Engine::with_defaults();
    engine.root().get("/boom", handler_fn(|_cx: &mut Context| async move {
        panic!("simulated handler panic");
    }));
    let addr = spawn_server(engine).await;

    let c = client();
    let uri: hyper::Uri = format!("http://{addr}/boom").parse().unwrap();
    let response = get(&c, uri).await;
    assert_eq!(response.status(), 500);
}
