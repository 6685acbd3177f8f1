// EsoxSolutions.ConnectionPool - Rust Port
// Thread-safe backend connection pool

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, PoolConfig, PoolableConnection};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct LoopbackConnection;

impl PoolableConnection for LoopbackConnection {
    fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
        Ok(())
    }
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== EsoxSolutions.ConnectionPool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = ConnectionPool::new(
        ConnectionConfig::new("localhost", 3306, "demo"),
        PoolConfig::new().with_limits(1, 4, 2),
        |_: &ConnectionConfig| -> Result<LoopbackConnection, BoxError> { Ok(LoopbackConnection) },
    )?;
    pool.start()?;

    {
        let conn = pool.get_connection(None)?;
        println!("  Got connection: {}", conn.id());
    }

    println!("  Available after return: {}", pool.available_count());
    pool.stop();
    Ok(())
}
