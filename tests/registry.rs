//! S5: registry round-trip with TTL eviction, driven over a real TCP
//! connection against `rpc::registry::run`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use psyrs::rpc::Registry;

async fn spawn_registry(registry: Arc<Registry>) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    tokio::spawn(psyrs::rpc::registry::run(registry, addr));
    tokio::time::sleep(Duration::from_millis(30)).await;
    addr
}

async fn post(client: &Client<HttpConnector, Full<Bytes>>, uri: &str, addr: &str) {
    let request = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(uri)
        .header("X-rpc-Server", addr)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = client.request(request).await.unwrap();
    assert_eq!(response.status(), 200);
}

async fn get_servers(client: &Client<HttpConnector, Full<Bytes>>, uri: &str) -> String {
    let request = hyper::Request::builder().method(hyper::Method::GET).uri(uri).body(Full::new(Bytes::new())).unwrap();
    let response = client.request(request).await.unwrap();
    response.headers().get("X-rpc-Servers").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
}

#[tokio::test]
async fn s5_registry_round_trip_over_http() {
    let registry = Arc::new(Registry::new(Duration::from_millis(150)));
    let addr = spawn_registry(registry).await;
    let uri = format!("http://{addr}/_rpc_/registry");
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();

    post(&client, &uri, "tcp@a:1").await;
    post(&client, &uri, "tcp@b:2").await;

    assert_eq!(get_servers(&client, &uri).await, "tcp@a:1,tcp@b:2");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(get_servers(&client, &uri).await, "");
}

#[tokio::test]
async fn post_without_header_is_500() {
    let registry = Arc::new(Registry::default());
    let addr = spawn_registry(registry).await;
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();

    let request = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(format!("http://{addr}/_rpc_/registry"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = client.request(request).await.unwrap();
    assert_eq!(response.status(), 500);
}
