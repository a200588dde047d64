#![forbid(unsafe_code)]

//! # psyrs
//!
//! A trie-routed web framework, bounded worker pool, and RPC resilience
//! fabric bundled into one crate, the three tightly-coupled subsystems
//! a small Go web framework used to ship as one module, carried over here
//! as three clearly separated Rust modules instead of one flat package.
//!
//! ## Modules
//!
//! - [`router`], trie path matching, a cooperative middleware chain, a
//!   pooled per-request [`router::Context`], and a `hyper`-based HTTP
//!   adapter.
//! - [`pool`], a bounded, expiry-aware pool of reusable async task
//!   runners with backpressure (blocking, non-blocking, or capped
//!   blocking-waiter) admission.
//! - [`rpc`], a service registry, periodic discovery with selectable
//!   load-balancing, a token-bucket rate limiter, and a three-state
//!   circuit breaker.
//!
//! ## Quick start
//!
//! ```rust
//! use psyrs::router::Engine;
//! use psyrs::router::context::{handler_fn, Context};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = Engine::with_defaults();
//! engine.root().get("/p/:lang/doc", handler_fn(|cx: &mut Context| async move {
//!     let lang = cx.param("lang").unwrap_or("unknown").to_string();
//!     cx.string(200, &format!("docs for {lang}"));
//! }));
//!
//! let ctx = engine.dispatch("GET".into(), "/p/rust/doc".into(), Vec::new(), Vec::new()).await;
//! assert_eq!(ctx.writer.body, b"docs for rust");
//! engine.recycle(ctx);
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod router;
pub mod rpc;

pub use error::Error;

/// Commonly used types, re-exported for a single `use psyrs::prelude::*;`.
pub mod prelude {
    pub use crate::clock::{Clock, MonotonicClock};
    pub use crate::config::AppConfig;
    pub use crate::pool::{Pool, PoolConfig, PoolError};
    pub use crate::router::{Context, Engine, Handler};
    pub use crate::rpc::{CircuitBreaker, Discovery, Registry, RpcError, TokenBucket, XClient};
}
