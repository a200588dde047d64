//! Submits more work than the pool's capacity and watches blocking
//! admission smooth it out into waves instead of overloading.
use psyrs::pool::{Pool, PoolConfig};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let pool = Pool::new(PoolConfig { capacity: 4, expiry: Duration::from_secs(30), ..Default::default() }).unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                println!("task {i} done");
            })
            .await
        }));
    }

    for h in handles {
        h.await.unwrap().unwrap();
    }

    println!("running: {}, free: {}", pool.running(), pool.free());
    pool.release();
}
