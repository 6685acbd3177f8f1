//! # EsoxSolutions.ConnectionPool (Rust Port)
//!
//! Thread-safe pool of backend connections for Rust: bounded capacity,
//! pluggable lending strategies, background health checks, idle and
//! lifetime expiry, and retrying connection creation with failover.
//!
//! ## Features
//!
//! - Single-lock pool state with RAII loans (connections return on drop)
//! - Round-robin, least-connections, weighted and random lending
//! - Background health-check and cleanup loops with bounded shutdown
//! - Validation on release and optional no-reuse mode
//! - Retry with delay across primary and failover hosts
//! - Lifecycle callbacks
//! - Statistics snapshot, health report and Prometheus export
//! - Async lend with a bounded wait
//!
//! The wire protocol is not part of this crate: connections come from a
//! caller-supplied factory and only need to implement [`PoolableConnection`].
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, PoolConfig, PoolableConnection};
//! use std::time::Duration;
//!
//! struct Session;
//!
//! impl PoolableConnection for Session {
//!     fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! let pool = ConnectionPool::new(
//!     ConnectionConfig::new("localhost", 3306, "orders"),
//!     PoolConfig::new().with_limits(1, 5, 2),
//!     |_: &ConnectionConfig| -> Result<Session, BoxError> { Ok(Session) },
//! )
//! .unwrap();
//!
//! pool.start().unwrap();
//! {
//!     let conn = pool.get_connection(None).unwrap();
//!     println!("Got: {}", conn.id());
//!     // Connection automatically returned when `conn` goes out of scope
//! }
//! pool.stop();
//! ```

mod pool;
mod config;
mod connection;
mod strategy;
mod metrics;
mod health;
mod eviction;
mod callbacks;
mod worker;
mod errors;

#[cfg(test)]
mod testing;

pub use pool::{ConnectionPool, PooledConnection};
pub use config::{ConnectionConfig, LendingStrategy, PoolConfig, TlsMode};
pub use connection::{
    ConnectionFactory, ConnectionHealth, ConnectionId, ConnectionInfo, ConnectionState, PoolableConnection,
};
pub use metrics::{PoolStats, PoolStatsSnapshot};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::PoolHealth;
pub use eviction::{EvictionPolicy, EvictionReason};
pub use errors::{BoxError, PoolError, PoolResult};
