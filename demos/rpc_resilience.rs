//! Wraps a flaky remote call in a rate limiter and a circuit breaker: the
//! limiter paces outbound calls, the breaker stops calling out once the
//! flaky side trips it and lets occasional probes through once it cools
//! down.
use psyrs::rpc::{BreakerSettings, CircuitBreaker, TokenBucket};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Unavailable;
impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service unavailable")
    }
}
impl std::error::Error for Unavailable {}

async fn flaky_call(attempt: usize) -> Result<&'static str, Unavailable> {
    if attempt < 4 {
        Err(Unavailable)
    } else {
        Ok("pong")
    }
}

#[tokio::main]
async fn main() {
    let limiter = TokenBucket::new(5.0, 5.0, Duration::from_millis(100));
    let breaker = Arc::new(CircuitBreaker::new(BreakerSettings::default()));
    let attempts = Arc::new(AtomicUsize::new(0));

    for round in 0..8 {
        limiter.acquire().await.expect("rate limiter never starves this demo");

        let attempts = attempts.clone();
        let result = breaker
            .execute(|| async {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                flaky_call(attempt).await
            })
            .await;

        match result {
            Ok(body) => println!("round {round}: {body}"),
            Err(e) if e.is_melted() => println!("round {round}: breaker open, call skipped"),
            Err(e) => println!("round {round}: call failed: {e}"),
        }
    }
}
