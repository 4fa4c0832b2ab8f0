//! Pool exhaustion/timeout/release scenario driven entirely through the
//! public `HttpPool` API, complementing the pool's own inline unit tests
//! (`src/http_pool.rs`) with a crate-external integration check of the same
//! contract.

use std::time::Duration;

use open_agent::{Error, HttpPool, HttpPoolConfig};

#[tokio::test]
async fn exhausted_pool_times_out_then_recovers_once_a_client_is_released() {
    let pool = HttpPool::new(HttpPoolConfig {
        max_connections: 1,
        acquire_timeout: Duration::from_millis(100),
        ..HttpPoolConfig::default()
    });

    let held = pool.acquire().await.expect("first acquire creates a client");
    assert_eq!(pool.total_count().await, 1);

    let exhausted = pool.acquire().await;
    assert!(matches!(exhausted, Err(Error::Timeout)));

    drop(held);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.idle_count().await, 1);

    let reused = pool.acquire().await.expect("released client becomes available again");
    assert_eq!(pool.total_count().await, 1);
    drop(reused);
}

#[tokio::test]
async fn shutdown_refuses_further_acquires() {
    let pool = HttpPool::new(HttpPoolConfig::default());
    let client = pool.acquire().await.unwrap();
    drop(client);
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown(Duration::from_secs(1)).await;

    assert_eq!(pool.total_count().await, 0);
    let result = pool.acquire().await;
    assert!(matches!(result, Err(Error::InvalidState(_))));
}
