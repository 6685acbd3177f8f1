//! Advanced features: strategies, health checks, eviction, failover, callbacks

use esox_connpool::{
    BoxError, ConnectionConfig, ConnectionPool, LendingStrategy, PoolConfig, PoolableConnection,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

struct FlakyConnection {
    host: String,
    backend_up: Arc<AtomicBool>,
}

impl PoolableConnection for FlakyConnection {
    fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
        if self.backend_up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(format!("{} stopped answering", self.host).into())
        }
    }

    fn close(&mut self) -> Result<(), BoxError> {
        println!("   closing connection to {}", self.host);
        Ok(())
    }
}

fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Advanced Features ===\n");

    // Example 1: Least-connections strategy
    least_connections();

    // Example 2: Health checks and callbacks
    health_checks();

    // Example 3: Idle eviction
    idle_eviction();

    // Example 4: Failover hosts
    failover();

    // Example 5: Prometheus metrics
    prometheus_export();
}

fn pool_with(
    config: PoolConfig,
    backend_up: Arc<AtomicBool>,
    refuse_primary: bool,
) -> ConnectionPool<FlakyConnection> {
    ConnectionPool::new(
        ConnectionConfig::new("db-primary", 3306, "shop"),
        config,
        move |config: &ConnectionConfig| -> Result<FlakyConnection, BoxError> {
            if refuse_primary && config.host == "db-primary" {
                return Err("connection refused".into());
            }
            Ok(FlakyConnection {
                host: config.host.clone(),
                backend_up: Arc::clone(&backend_up),
            })
        },
    )
    .unwrap()
}

fn least_connections() {
    println!("1. Least-Connections Strategy:");
    let pool = pool_with(
        PoolConfig::new()
            .with_limits(3, 3, 3)
            .with_strategy(LendingStrategy::LeastConnections),
        Arc::new(AtomicBool::new(true)),
        false,
    );
    pool.start().unwrap();

    for _ in 0..6 {
        let conn = pool.get_connection(None).unwrap();
        drop(conn);
    }
    for info in pool.connections() {
        println!("   {} used {} times", info.id, info.use_count);
    }
    pool.stop();
    println!();
}

fn health_checks() {
    println!("2. Health Checks:");
    let backend_up = Arc::new(AtomicBool::new(true));
    let pool = pool_with(
        PoolConfig::new()
            .with_limits(2, 4, 2)
            .with_health_check(Duration::from_millis(50), Duration::from_millis(50), "SELECT 1")
            .with_cleanup_interval(Duration::from_millis(100)),
        Arc::clone(&backend_up),
        false,
    );

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    pool.set_on_health_check_failed(move |info| {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("   health check failed for {}", info.id);
    });
    pool.start().unwrap();

    backend_up.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(120));
    backend_up.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(250));

    println!("   Failures observed: {}", failures.load(Ordering::SeqCst));
    println!("   Connections after refill: {}", pool.get_stats().stats.total_connections);
    pool.stop();
    println!();
}

fn idle_eviction() {
    println!("3. Idle Eviction:");
    let pool = pool_with(
        PoolConfig::new()
            .with_limits(1, 4, 3)
            .without_health_checks()
            .with_idle_timeout(Some(Duration::from_millis(50))),
        Arc::new(AtomicBool::new(true)),
        false,
    );
    pool.start().unwrap();
    println!("   Before: {}", pool.get_stats().stats.total_connections);

    thread::sleep(Duration::from_millis(100));
    let evicted = pool.run_cleanup();
    println!("   Evicted: {}", evicted);
    println!("   After refill: {}", pool.get_stats().stats.total_connections);
    pool.stop();
    println!();
}

fn failover() {
    println!("4. Failover Hosts:");
    let pool = pool_with(
        PoolConfig::new()
            .with_limits(0, 2, 0)
            .with_retry(2, Duration::from_millis(10))
            .with_failover_hosts(["db-replica"]),
        Arc::new(AtomicBool::new(true)),
        true,
    );

    let conn = pool.get_connection(None).unwrap();
    println!("   Connected to {}", conn.host);
    println!();
}

fn prometheus_export() {
    println!("5. Prometheus Export:");
    let pool = pool_with(
        PoolConfig::new().with_limits(1, 4, 1),
        Arc::new(AtomicBool::new(true)),
        false,
    );
    pool.start().unwrap();
    let _conn = pool.get_connection(None).unwrap();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "checkout".to_string());
    match pool.export_metrics_prometheus("shop_db", Some(&tags)) {
        Ok(output) => println!("{}", output),
        Err(e) => println!("   export failed: {}", e),
    }
}
