//! Async usage examples

use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, PoolConfig, PoolError, PoolableConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

struct DemoConnection;

impl PoolableConnection for DemoConnection {
    fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
        Ok(())
    }
}

fn new_pool(config: PoolConfig) -> ConnectionPool<DemoConnection> {
    ConnectionPool::new(
        ConnectionConfig::new("localhost", 5432, "demo"),
        config,
        |_: &ConnectionConfig| -> Result<DemoConnection, BoxError> { Ok(DemoConnection) },
    )
    .unwrap()
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Async Examples ===\n");

    // Example 1: Async get
    async_get().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

async fn async_get() {
    println!("1. Async Get:");
    let pool = new_pool(PoolConfig::new().with_limits(1, 3, 1));

    {
        let conn = pool.get_connection_async(None).await.unwrap();
        println!("   Got connection asynchronously: {}", conn.id());
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");
    let pool = new_pool(PoolConfig::new().with_limits(0, 1, 0));

    // Take the only connection
    let _conn = pool.get_connection(None).unwrap();

    // Waiting for another one times out
    match pool.get_connection_async(Some(Duration::from_millis(100))).await {
        Ok(_) => println!("   Got connection"),
        Err(PoolError::Timeout(waited)) => println!("   Timed out after {:?} (expected)", waited),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = Arc::new(new_pool(PoolConfig::new().with_limits(2, 3, 2)));
    pool.start().unwrap();

    let mut handles = vec![];
    for i in 0..6 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            let conn = pool.get_connection_async(Some(Duration::from_secs(2))).await.unwrap();
            println!("   Task {} got {}", i, conn.id());
            sleep(Duration::from_millis(20)).await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let stats = pool.get_stats();
    println!("   Requests: {}", stats.stats.connection_requests);
    println!("   Connections created: {}", stats.stats.total_connections);
    pool.stop();
}
