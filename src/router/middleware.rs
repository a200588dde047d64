//! Built-in middleware: request logging and panic recovery.
//!
//! Grounded on `psygo/log.go` (`Logger()`) and `psygo/recovery.go`
//! (`Recovery()`). The source hand-rolls an ANSI-colored formatter for
//! the logger; that formatter is out of scope, but structured
//! per-request logging is not, so this emits a `tracing` span instead.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use super::context::{handler_fn, Context, Handler};

/// Carries a panic payload that should be handled by caller-supplied logic
/// instead of the generic 500, mirroring `psyerror.PsyError`'s
/// `ErrFunc`/`ExecResult` pair: a handler can `std::panic::panic_any` one of
/// these and the recovery middleware invokes `handle` instead of writing
/// the default error response.
pub struct DomainError {
    pub message: String,
    pub handle: Box<dyn FnOnce(&mut Context) + Send>,
}

/// Emits one `tracing::info!` per request: method, path, status, latency.
pub fn logger() -> Arc<dyn Handler> {
    handler_fn(|cx: &mut Context| async move {
        let start = Instant::now();
        let method = cx.method.clone();
        let path = cx.path.clone();
        cx.next().await;
        let status = cx.writer.status;
        let latency_ms = start.elapsed().as_millis();
        tracing::info!(%method, %path, status, latency_ms, "request");
    })
}

/// Catches a panic anywhere downstream in the chain, converting it into a
/// 500 (and logging it via `tracing::error!`) unless the panic payload is a
/// [`DomainError`], in which case its `handle` runs instead; the chain is
/// aborted either way.
pub fn recovery() -> Arc<dyn Handler> {
    handler_fn(|cx: &mut Context| async move {
        let result = AssertUnwindSafe(cx.next()).catch_unwind().await;
        match result {
            Ok(()) => {}
            Err(payload) => {
                match payload.downcast::<DomainError>() {
                    Ok(domain_error) => {
                        (domain_error.handle)(cx);
                    }
                    Err(payload) => {
                        let message = panic_message(&payload);
                        tracing::error!(message = %message, "handler panicked");
                        cx.fail(500, "internal server error");
                    }
                }
                cx.abort();
            }
        }
    })
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::context::handler_fn;

    #[tokio::test]
    async fn recovery_converts_panic_to_500() {
        let mut cx = Context::default();
        cx.set_handlers(vec![
            recovery(),
            handler_fn(|_cx: &mut Context| async move {
                panic!("boom");
            }),
        ]);
        cx.next().await;
        assert_eq!(cx.writer.status, 500);
    }

    #[tokio::test]
    async fn recovery_invokes_domain_error_handler() {
        let mut cx = Context::default();
        cx.set_handlers(vec![
            recovery(),
            handler_fn(|_cx: &mut Context| async move {
                std::panic::panic_any(DomainError {
                    message: "validation failed".to_string(),
                    handle: Box::new(|cx| cx.fail(422, "validation failed")),
                });
            }),
        ]);
        cx.next().await;
        assert_eq!(cx.writer.status, 422);
    }

    #[tokio::test]
    async fn logger_does_not_disturb_the_response() {
        let mut cx = Context::default();
        cx.set_handlers(vec![
            logger(),
            handler_fn(|cx: &mut Context| async move { cx.string(200, "ok") }),
        ]);
        cx.next().await;
        assert_eq!(cx.writer.status, 200);
    }
}
