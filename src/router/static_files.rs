//! Static file serving, registered via [`super::engine::RouterGroup::static_files`].
//!
//! Grounded on `psygo/psy.go`'s `createStaticHandler`/`Static`: strip the
//! group prefix, join the remaining `*filepath` capture onto the
//! filesystem root, and answer 404 without panicking when the file is
//! missing or unreadable. Kept intentionally thin: a real static file
//! server (range requests, ETags, directory listing) is out of scope,
//! this exists only so the router is exercisable end to end.

use std::path::PathBuf;
use std::sync::Arc;

use super::context::{handler_fn, Context, Handler};

pub fn handler(root: PathBuf) -> Arc<dyn Handler> {
    handler_fn(move |cx: &mut Context| {
        let root = root.clone();
        async move {
            let Some(rel) = cx.param("filepath").map(str::to_string) else {
                cx.status(404);
                return;
            };
            let full = root.join(&rel);
            match tokio::fs::read(&full).await {
                Ok(bytes) => {
                    let content_type = guess_content_type(&full);
                    cx.render(
                        200,
                        &super::render::Data { content_type, bytes },
                    );
                }
                Err(_) => cx.status(404),
            }
        }
    })
}

fn guess_content_type(path: &std::path::Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
    .to_string()
}
