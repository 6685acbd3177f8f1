//! Connection handles, factories and per-connection lifecycle metadata

use crate::config::ConnectionConfig;
use crate::errors::BoxError;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Available for lending
    Idle,

    /// Lent to a caller
    InUse,

    /// Being probed by the health-check loop
    Testing,

    /// Failed a probe, about to be disposed
    Failed,

    /// Disposed
    Closed,
}

/// Outcome of the most recent probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionHealth {
    /// Never probed
    #[default]
    Unknown,

    /// Last probe succeeded
    Healthy,

    /// Last probe failed
    Unhealthy,
}

/// Lifecycle metadata for one pooled connection.
///
/// Callbacks and inspection methods receive copies of this; the live handle
/// itself stays inside the pool.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub created_at: Instant,
    pub last_used: Instant,
    pub use_count: u64,
    pub last_health_check: Option<Instant>,
    pub health_status: ConnectionHealth,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl ConnectionInfo {
    pub(crate) fn new(host: &str) -> Self {
        let now = Instant::now();
        let mut metadata = HashMap::new();
        metadata.insert("host".to_string(), host.to_string());
        Self {
            id: ConnectionId::next(),
            state: ConnectionState::Idle,
            created_at: now,
            last_used: now,
            use_count: 0,
            last_health_check: None,
            health_status: ConnectionHealth::Unknown,
            error_count: 0,
            last_error: None,
            metadata,
        }
    }

    /// Time since the connection was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last lent or returned
    pub fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// True when never probed or the last probe is older than `interval`
    pub fn needs_health_check(&self, interval: Duration) -> bool {
        match self.last_health_check {
            None => true,
            Some(at) => at.elapsed() >= interval,
        }
    }

    pub(crate) fn mark_in_use(&mut self) {
        self.state = ConnectionState::InUse;
        self.use_count += 1;
        self.last_used = Instant::now();
    }

    pub(crate) fn mark_idle(&mut self) {
        self.state = ConnectionState::Idle;
        self.last_used = Instant::now();
    }

    pub(crate) fn record_probe_success(&mut self) {
        self.state = ConnectionState::Idle;
        self.health_status = ConnectionHealth::Healthy;
        self.last_health_check = Some(Instant::now());
        self.error_count = 0;
        self.last_error = None;
    }

    pub(crate) fn record_probe_failure(&mut self, reason: &str) {
        self.state = ConnectionState::Failed;
        self.health_status = ConnectionHealth::Unhealthy;
        self.last_health_check = Some(Instant::now());
        self.error_count += 1;
        self.last_error = Some(reason.to_string());
    }
}

/// A live backend connection the pool can probe and close.
///
/// Only the probe is required; `close` defaults to doing nothing, in which
/// case dropping the handle is the disposal.
pub trait PoolableConnection: Send + 'static {
    /// Run the health-check query, failing if it errors or exceeds `timeout`
    fn ping(&mut self, query: &str, timeout: Duration) -> Result<(), BoxError>;

    /// Close the underlying transport
    fn close(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Creates backend connections from a [`ConnectionConfig`].
///
/// Implemented for every `Fn(&ConnectionConfig) -> Result<C, BoxError>`.
pub trait ConnectionFactory<C>: Send + Sync + 'static {
    fn connect(&self, config: &ConnectionConfig) -> Result<C, BoxError>;
}

impl<C, F> ConnectionFactory<C> for F
where
    F: Fn(&ConnectionConfig) -> Result<C, BoxError> + Send + Sync + 'static,
{
    fn connect(&self, config: &ConnectionConfig) -> Result<C, BoxError> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[test]
    fn test_lend_bumps_use_count() {
        let mut info = ConnectionInfo::new("db");
        assert_eq!(info.state, ConnectionState::Idle);
        assert_eq!(info.metadata.get("host").map(String::as_str), Some("db"));

        info.mark_in_use();
        info.mark_idle();
        info.mark_in_use();
        assert_eq!(info.use_count, 2);
        assert_eq!(info.state, ConnectionState::InUse);
    }

    #[test]
    fn test_needs_health_check() {
        let mut info = ConnectionInfo::new("db");
        assert!(info.needs_health_check(Duration::from_secs(60)));

        info.record_probe_success();
        assert!(!info.needs_health_check(Duration::from_secs(60)));

        thread::sleep(Duration::from_millis(5));
        assert!(info.needs_health_check(Duration::from_millis(1)));
    }

    #[test]
    fn test_probe_failure_then_success_resets_errors() {
        let mut info = ConnectionInfo::new("db");
        info.record_probe_failure("broken pipe");
        assert_eq!(info.state, ConnectionState::Failed);
        assert_eq!(info.error_count, 1);
        assert_eq!(info.health_status, ConnectionHealth::Unhealthy);

        info.record_probe_success();
        assert_eq!(info.error_count, 0);
        assert!(info.last_error.is_none());
        assert_eq!(info.health_status, ConnectionHealth::Healthy);
    }
}
