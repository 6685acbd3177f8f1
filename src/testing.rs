//! Scriptable connection and factory used by the unit tests

use crate::config::ConnectionConfig;
use crate::connection::PoolableConnection;
use crate::errors::BoxError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct MockConnection {
    pub host: String,
    /// Per-connection health; flip to fail the next probe of this connection
    pub healthy: AtomicBool,
    backend_healthy: Arc<AtomicBool>,
    pings: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl PoolableConnection for MockConnection {
    fn ping(&mut self, query: &str, _timeout: Duration) -> Result<(), BoxError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        assert!(!query.is_empty());
        if self.healthy.load(Ordering::SeqCst) && self.backend_healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("server has gone away".into())
        }
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err("socket already closed".into())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub(crate) struct MockFactory {
    pub failures_remaining: AtomicUsize,
    pub always_fail: AtomicBool,
    pub fail_close: AtomicBool,
    pub created: AtomicUsize,
    pub hosts: Mutex<Vec<String>>,
    backend_healthy: Arc<AtomicBool>,
    pings: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        let factory = Self::default();
        factory.backend_healthy.store(true, Ordering::SeqCst);
        Arc::new(factory)
    }

    /// Make every existing and future connection fail its probes
    pub fn set_backend_healthy(&self, healthy: bool) {
        self.backend_healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn connect(&self, config: &ConnectionConfig) -> Result<MockConnection, BoxError> {
        self.hosts.lock().push(config.host.clone());
        if self.always_fail.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err("connection refused".into());
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            host: config.host.clone(),
            healthy: AtomicBool::new(true),
            backend_healthy: Arc::clone(&self.backend_healthy),
            pings: Arc::clone(&self.pings),
            closes: Arc::clone(&self.closes),
            fail_close: self.fail_close.load(Ordering::SeqCst),
        })
    }

    /// Closure form accepted by `ConnectionPool::new`
    pub fn as_factory(
        self: Arc<Self>,
    ) -> impl Fn(&ConnectionConfig) -> Result<MockConnection, BoxError> + Send + Sync + 'static {
        move |config: &ConnectionConfig| self.connect(config)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}
