//! Engine and router groups.
//!
//! Grounded on `psygo/psy.go` (`Engine`, `RouterGroup`, `ServeHTTP`) and
//! `psygo/router.go` (`router.addRoute` / `router.getRoute` / `router.handle`).
//! One trie per HTTP method; a `(method, pattern)` key maps to the bound
//! handler. Groups nest by prefix *string* concatenation, preserving the
//! source's quirk rather than fixing it: middleware collection at
//! dispatch time matches by `str::starts_with`, not by path component, so
//! a group `/v1` also matches requests under `/v10`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::context::{handler_fn, Context, ContextPool, Handler};
use super::trie::{self, Node};

struct GroupInfo {
    prefix: String,
    middlewares: Vec<Arc<dyn Handler>>,
}

struct EngineInner {
    roots: HashMap<String, Node>,
    handlers: HashMap<(String, String), Arc<dyn Handler>>,
    groups: Vec<GroupInfo>,
}

/// The router engine: one per server instance, shared by every
/// [`RouterGroup`] derived from it.
pub struct Engine {
    inner: Mutex<EngineInner>,
    pool: ContextPool,
}

impl Engine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                roots: HashMap::new(),
                handlers: HashMap::new(),
                groups: vec![GroupInfo { prefix: String::new(), middlewares: Vec::new() }],
            }),
            pool: ContextPool::new(),
        })
    }

    /// `Default()` in the source: the root group with logger + recovery
    /// middleware already attached.
    pub fn with_defaults() -> Arc<Self> {
        let engine = Self::new();
        engine.root().use_middleware(vec![
            super::middleware::logger(),
            super::middleware::recovery(),
        ]);
        engine
    }

    /// The root router group (prefix `""`), equivalent to the source's
    /// embedded `*RouterGroup` on `Engine`.
    pub fn root(self: &Arc<Self>) -> RouterGroup {
        RouterGroup { engine: Arc::clone(self), index: 0, prefix: String::new() }
    }

    fn add_route(&self, method: &str, pattern: &str, handler: Arc<dyn Handler>) {
        let parts = trie::parse_pattern(pattern);
        let mut inner = self.inner.lock().unwrap();
        inner.roots.entry(method.to_string()).or_default().insert(pattern, &parts, 0);
        inner.handlers.insert((method.to_string(), pattern.to_string()), handler);
    }

    /// Resolve `(method, path)` into the assembled handler chain and
    /// captured params, mirroring `router.handle` + the `ServeHTTP`
    /// middleware-collection loop. A miss appends a synthetic 404 handler
    /// instead of returning an error, so route-not-found never propagates
    /// as a `Result::Err` a caller has to handle.
    fn resolve(&self, method: &str, path: &str) -> (Vec<Arc<dyn Handler>>, HashMap<String, String>) {
        let inner = self.inner.lock().unwrap();

        let mut handlers: Vec<Arc<dyn Handler>> = Vec::new();
        for group in &inner.groups {
            if path.starts_with(&group.prefix) {
                handlers.extend(group.middlewares.iter().cloned());
            }
        }

        let search_parts = trie::parse_pattern(path);
        let params;
        if let Some(root) = inner.roots.get(method) {
            if let Some(node) = root.search(&search_parts, 0) {
                params = trie::extract_params(node.pattern(), &search_parts);
                let key = (method.to_string(), node.pattern().to_string());
                if let Some(route_handler) = inner.handlers.get(&key) {
                    handlers.push(Arc::clone(route_handler));
                    return (handlers, params);
                }
            }
        }
        params = HashMap::new();
        let path_owned = path.to_string();
        handlers.push(handler_fn(move |cx: &mut Context| {
            let path = path_owned.clone();
            async move {
                cx.string(404, format!("404 NOT FOUND: {}\n", path));
            }
        }));
        (handlers, params)
    }

    /// Run one request through the middleware + handler chain and return the
    /// populated [`Context`] for the caller to translate into a wire
    /// response. Caller must [`Engine::recycle`] the context exactly once.
    pub async fn dispatch(
        &self,
        method: String,
        path: String,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Box<Context> {
        let (handlers, params) = self.resolve(&method, &path);
        let mut ctx = self.pool.checkout();
        ctx.reset(method, path, body, headers);
        ctx.params = params;
        ctx.set_handlers(handlers);
        ctx.next().await;
        ctx
    }

    /// Return a context to the free list. Never call twice on the same
    /// context, and never call before the handler chain has fully run:
    /// the context must not escape its one request.
    pub fn recycle(&self, ctx: Box<Context>) {
        self.pool.checkin(ctx);
    }
}

/// One nesting level of routes + middleware, sharing the parent `Engine`.
/// Grounded on `psygo/psy.go`'s `RouterGroup`.
#[derive(Clone)]
pub struct RouterGroup {
    engine: Arc<Engine>,
    index: usize,
    prefix: String,
}

impl RouterGroup {
    /// Create a child group whose prefix is this group's prefix with
    /// `relative` appended (string concatenation, not path-joining, same
    /// as the source's `group.prefix + prefix`).
    pub fn group(&self, relative: &str) -> RouterGroup {
        let prefix = format!("{}{}", self.prefix, relative);
        let index = {
            let mut inner = self.engine.inner.lock().unwrap();
            inner.groups.push(GroupInfo { prefix: prefix.clone(), middlewares: Vec::new() });
            inner.groups.len() - 1
        };
        RouterGroup { engine: Arc::clone(&self.engine), index, prefix }
    }

    pub fn use_middleware(&self, middlewares: Vec<Arc<dyn Handler>>) {
        let mut inner = self.engine.inner.lock().unwrap();
        inner.groups[self.index].middlewares.extend(middlewares);
    }

    fn add_route(&self, method: &str, comp: &str, handler: Arc<dyn Handler>) {
        let pattern = format!("{}{}", self.prefix, comp);
        self.engine.add_route(method, &pattern, handler);
    }

    pub fn get(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("GET", pattern, handler);
    }
    pub fn post(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("POST", pattern, handler);
    }
    pub fn put(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("PUT", pattern, handler);
    }
    pub fn delete(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("DELETE", pattern, handler);
    }
    pub fn patch(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("PATCH", pattern, handler);
    }
    pub fn options(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("OPTIONS", pattern, handler);
    }
    pub fn head(&self, pattern: &str, handler: Arc<dyn Handler>) {
        self.add_route("HEAD", pattern, handler);
    }

    /// Register a static file route at `relative_path/*filepath`, serving
    /// files under `root` on disk. Mirrors `RouterGroup.Static`.
    pub fn static_files(&self, relative_path: &str, root: impl Into<std::path::PathBuf>) {
        let handler = super::static_files::handler(root.into());
        let pattern = format!("{}/*filepath", relative_path.trim_end_matches('/'));
        self.get(&pattern, handler);
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn s1_route_params() {
        let engine = Engine::new();
        let root = engine.root();
        root.get(
            "/p/:lang/doc",
            handler_fn(|cx: &mut Context| async move {
                let lang = cx.param("lang").unwrap().to_string();
                cx.string(200, lang);
            }),
        );

        let ctx = engine.dispatch("GET".into(), "/p/python/doc".into(), Vec::new(), Vec::new()).await;
        assert_eq!(ctx.params.get("lang"), Some(&"python".to_string()));
        assert_eq!(ctx.writer.status, 200);
        assert_eq!(ctx.writer.body, b"python");
        engine.recycle(ctx);
    }

    #[tokio::test]
    async fn s2_catch_all() {
        let engine = Engine::new();
        let root = engine.root();
        root.get(
            "/assets/*filepath",
            handler_fn(|cx: &mut Context| async move {
                let f = cx.param("filepath").unwrap().to_string();
                cx.string(200, f);
            }),
        );

        let ctx = engine.dispatch("GET".into(), "/assets/js/app.js".into(), Vec::new(), Vec::new()).await;
        assert_eq!(ctx.params.get("filepath"), Some(&"js/app.js".to_string()));
        engine.recycle(ctx);
    }

    #[tokio::test]
    async fn unmatched_route_yields_synthetic_404() {
        let engine = Engine::new();
        let ctx = engine.dispatch("GET".into(), "/nope".into(), Vec::new(), Vec::new()).await;
        assert_eq!(ctx.writer.status, 404);
        engine.recycle(ctx);
    }

    #[tokio::test]
    async fn group_middleware_runs_for_prefix_matches() {
        let engine = Engine::new();
        let root = engine.root();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let api = root.group("/api");
        api.use_middleware(vec![handler_fn(move |cx: &mut Context| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                cx.next().await;
            }
        })]);
        api.get("/ping", handler_fn(|cx: &mut Context| async move { cx.string(200, "pong"); }));

        let ctx = engine.dispatch("GET".into(), "/api/ping".into(), Vec::new(), Vec::new()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.writer.body, b"pong");
        engine.recycle(ctx);
    }
}
