use criterion::{black_box, criterion_group, criterion_main, Criterion};
use psyrs::rpc::{BreakerSettings, CircuitBreaker};

use std::fmt;
use std::time::Duration;

#[derive(Debug)]
struct Boom;
impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}
impl std::error::Error for Boom {}

fn breaker_throughput_closed(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let breaker = CircuitBreaker::new(BreakerSettings::default());

    c.bench_function("circuit_breaker_closed_path", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(breaker.execute(|| async { Ok::<_, Boom>("ok") }).await);
        });
    });
}

fn breaker_throughput_open(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let settings = BreakerSettings {
        timeout: Duration::from_secs(3600),
        ready_to_trip: Box::new(|counts| counts.consecutive_failures >= 1),
        ..Default::default()
    };
    let breaker = CircuitBreaker::new(settings);
    rt.block_on(async {
        let _ = breaker.execute(|| async { Err::<(), _>(Boom) }).await;
    });

    c.bench_function("circuit_breaker_open_fast_fail", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(breaker.execute(|| async { Ok::<_, Boom>("ok") }).await);
        });
    });
}

criterion_group!(benches, breaker_throughput_closed, breaker_throughput_open);
criterion_main!(benches);
