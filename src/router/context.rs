//! Per-request context: typed key/value store, handler chain with
//! cooperative `next`/`abort`, and pooled reuse.
//!
//! Grounded on `psygo/context.go`. `index` ranges `[-1, len(handlers)]`:
//! `-1` is the reset state, `len(handlers)` is the aborted/terminal state,
//! see [`Context::abort`].

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use super::render::Render;

/// A single handler in the chain. Mirrors the source's `HandlerFunc`, but
/// async and object-safe via `async-trait` (already a teacher dependency).
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, cx: &mut Context);
}

/// Adapt a plain async closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(&mut Context) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn call(&self, cx: &mut Context) {
        (self.0)(cx).await;
    }
}

/// Build a boxed [`Handler`] from an async closure, the common case at
/// route-registration call sites.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A structured error recorded by a handler via [`Context::error`], mirroring
/// the source's `errorMsgs` / `*Error` list.
#[derive(Debug, Clone)]
pub struct ContextError {
    pub message: String,
    pub error_type: ErrorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Private,
    Public,
    Bind,
    Render,
}

/// Buffers a response until the request finishes; the server adapter
/// (`router::server`) turns this into a real `hyper::Response` afterwards.
/// Kept separate from `hyper::Response` so context construction and reset
/// don't depend on the transport crate's response builder API.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseBuffer {
    fn reset(&mut self) {
        self.status = 0;
        self.headers.clear();
        self.body.clear();
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
            return;
        }
        self.headers.push((key.to_string(), value.to_string()));
    }
}

/// Per-request state, checked out of an [`Pool`] for the lifetime of one
/// request and never allowed to escape the handler chain.
pub struct Context {
    pub method: String,
    pub path: String,
    pub request_body: Vec<u8>,
    pub request_headers: Vec<(String, String)>,
    pub params: HashMap<String, String>,
    pub writer: ResponseBuffer,
    handlers: Vec<Arc<dyn Handler>>,
    index: i64,
    keys: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    pub errors: Vec<ContextError>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            method: String::new(),
            path: String::new(),
            request_body: Vec::new(),
            request_headers: Vec::new(),
            params: HashMap::new(),
            writer: ResponseBuffer::default(),
            handlers: Vec::new(),
            index: -1,
            keys: RwLock::new(HashMap::new()),
            errors: Vec::new(),
        }
    }
}

impl Context {
    /// Reset per-request fields in place for reuse from the pool. Does not
    /// touch the pool itself, callers `put` exactly once after dispatch.
    pub fn reset(&mut self, method: String, path: String, body: Vec<u8>, headers: Vec<(String, String)>) {
        self.method = method;
        self.path = path;
        self.request_body = body;
        self.request_headers = headers;
        self.params.clear();
        self.writer.reset();
        self.handlers.clear();
        self.index = -1;
        self.keys.write().unwrap().clear();
        self.errors.clear();
    }

    pub fn set_handlers(&mut self, handlers: Vec<Arc<dyn Handler>>) {
        self.handlers = handlers;
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn request_header(&self, key: &str) -> Option<&str> {
        self.request_headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.keys.write().unwrap().insert(key.into(), Box::new(value));
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.keys.read().unwrap().get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub fn status(&mut self, code: u16) {
        self.writer.status = code;
    }

    pub fn header(&mut self, key: &str, value: &str) {
        self.writer.set_header(key, value);
    }

    /// Advance the chain and execute handlers up to `len(handlers)`. A
    /// handler may call `next()` again from inside its own body to run
    /// downstream handlers before its own post-processing, the recursive
    /// call just continues advancing the same `index`, exactly like the
    /// source's single `for ; c.index < s; c.index++` loop invoked
    /// re-entrantly.
    pub fn next<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.index += 1;
            let len = self.handlers.len() as i64;
            while self.index < len {
                let idx = self.index as usize;
                let handler = Arc::clone(&self.handlers[idx]);
                handler.call(self).await;
                self.index += 1;
            }
        })
    }

    /// Prevent any pending handler from running. Does not interrupt the
    /// currently executing handler, it simply fast-forwards `index` past
    /// the end of the chain so the enclosing `next()` loop stops.
    pub fn abort(&mut self) {
        self.index = self.handlers.len() as i64;
    }

    /// Abort and write a JSON error response.
    pub fn fail(&mut self, status: u16, message: impl Into<String>) {
        self.abort();
        self.render(status, &super::render::Json(serde_json::json!({ "error": message.into() })));
    }

    pub fn error(&mut self, message: impl Into<String>, error_type: ErrorType) {
        self.errors.push(ContextError { message: message.into(), error_type });
    }

    pub fn render(&mut self, status: u16, render: &dyn Render) {
        self.writer.status = status;
        render.set_content_type(&mut self.writer);
        if let Err(e) = render.write(&mut self.writer) {
            self.error(e.to_string(), ErrorType::Render);
            self.abort();
        }
    }

    pub fn json(&mut self, status: u16, value: serde_json::Value) {
        self.render(status, &super::render::Json(value));
    }

    pub fn string(&mut self, status: u16, body: impl Into<String>) {
        self.render(status, &super::render::Text(body.into()));
    }

    pub fn xml(&mut self, status: u16, body: impl Into<String>) {
        self.render(status, &super::render::Xml(body.into()));
    }
}

/// Thread-safe object pool of [`Context`]s, avoiding an allocation per
/// request. Mirrors the source's `sync.Pool`-backed `engine.pool`, but as
/// an explicit free list: `sync.Pool` may drop entries under GC pressure,
/// which Rust has no equivalent of, so a plain `Mutex<Vec<_>>` free list is
/// both simpler and a closer match to what the source actually needs
/// (bounded reuse, not a cache).
#[derive(Default)]
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkout(&self) -> Box<Context> {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    pub fn checkin(&self, ctx: Box<Context>) {
        self.free.lock().unwrap().push(ctx);
    }
}
