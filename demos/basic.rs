//! Basic usage examples for ConnectionPool

use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, PoolConfig, PoolableConnection};
use std::time::Duration;

struct DemoConnection {
    label: String,
}

impl PoolableConnection for DemoConnection {
    fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
        Ok(())
    }
}

fn connect(config: &ConnectionConfig) -> Result<DemoConnection, BoxError> {
    Ok(DemoConnection {
        label: format!("{}:{}/{}", config.host, config.port, config.database),
    })
}

fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool();

    // Example 2: Capacity limits
    capacity_limits();

    // Example 3: Explicit release and close
    release_and_close();

    // Example 4: Stats and health
    stats_and_health();
}

fn new_pool(config: PoolConfig) -> ConnectionPool<DemoConnection> {
    ConnectionPool::new(ConnectionConfig::new("localhost", 3306, "demo"), config, connect).unwrap()
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = new_pool(PoolConfig::new().with_limits(1, 3, 2));
    pool.start().unwrap();

    {
        let conn = pool.get_connection(None).unwrap();
        println!("   Got connection {} to {}", conn.id(), conn.label);
        // Connection automatically returned when dropped
    }

    println!("   Available after return: {}\n", pool.available_count());
    pool.stop();
}

fn capacity_limits() {
    println!("2. Capacity Limits:");
    let pool = new_pool(PoolConfig::new().with_limits(0, 2, 0));

    let first = pool.try_get_connection();
    let second = pool.try_get_connection();
    let third = pool.try_get_connection();
    println!("   First: {}", first.is_some());
    println!("   Second: {}", second.is_some());
    println!("   Third: {} (pool exhausted)", third.is_some());

    drop(first);
    println!("   After one return: {}\n", pool.try_get_connection().is_some());
}

fn release_and_close() {
    println!("3. Release and Close:");
    let pool = new_pool(PoolConfig::new().with_limits(0, 2, 0));

    let conn = pool.get_connection(None).unwrap();
    println!("   Released: {}", pool.release_connection(conn));

    let conn = pool.get_connection(None).unwrap();
    println!("   Closed: {}", pool.close_connection(conn));
    println!("   Tracked connections: {}\n", pool.get_stats().stats.total_connections);
}

fn stats_and_health() {
    println!("4. Stats and Health:");
    let pool = new_pool(PoolConfig::new().with_limits(1, 5, 2));
    pool.start().unwrap();

    {
        let _conn1 = pool.get_connection(None).unwrap();
        let _conn2 = pool.get_connection(None).unwrap();

        let health = pool.get_health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.capacity_utilization * 100.0);
        println!("   Active: {}, Idle: {}", health.active_connections, health.idle_connections);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
    pool.stop();
}
