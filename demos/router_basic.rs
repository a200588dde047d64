//! Minimal router demo: a param route, a catch-all, and a real HTTP server.
use psyrs::router::context::{handler_fn, Context};
use psyrs::router::{server, Engine};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let engine = Engine::with_defaults();

    engine.root().get(
        "/p/:lang/doc",
        handler_fn(|cx: &mut Context| async move {
            let lang = cx.param("lang").unwrap_or("unknown").to_string();
            cx.string(200, format!("docs for {lang}"));
        }),
    );

    engine.root().get(
        "/assets/*filepath",
        handler_fn(|cx: &mut Context| async move {
            let path = cx.param("filepath").unwrap_or_default().to_string();
            cx.string(200, format!("serving {path}"));
        }),
    );

    let addr: std::net::SocketAddr = "127.0.0.1:8080".parse().unwrap();
    println!("listening on http://{addr}");
    server::run(engine, addr).await
}
