//! Connection pool orchestrator

use crate::callbacks::{PoolCallbacks, PoolEvent};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::connection::{ConnectionFactory, ConnectionId, ConnectionInfo, ConnectionState, PoolableConnection};
use crate::errors::{PoolError, PoolResult};
use crate::eviction::EvictionPolicy;
use crate::health::PoolHealth;
use crate::metrics::{PoolStats, PoolStatsSnapshot};
use crate::strategy;
use crate::worker::BackgroundWorker;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// A connection on loan from the pool.
///
/// Dropping the guard hands the connection back exactly like
/// [`ConnectionPool::release_connection`].
pub struct PooledConnection<C: PoolableConnection> {
    connection: Option<C>,
    id: ConnectionId,
    pool: Weak<Shared<C>>,
}

impl<C: PoolableConnection> PooledConnection<C> {
    /// Identifier of the pooled connection
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<C: PoolableConnection> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("returned", &self.connection.is_none())
            .finish()
    }
}

impl<C: PoolableConnection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection already returned")
    }
}

impl<C: PoolableConnection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut().expect("connection already returned")
    }
}

impl<C: PoolableConnection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            match self.pool.upgrade() {
                Some(shared) => {
                    shared.release(self.id, connection);
                }
                None => close_quietly(self.id, connection),
            }
        }
    }
}

struct Entry<C> {
    info: ConnectionInfo,
    /// `None` while the connection is on loan
    connection: Option<C>,
}

/// Everything guarded by the pool lock
struct PoolState<C> {
    connections: HashMap<ConnectionId, Entry<C>>,
    available: Vec<ConnectionId>,
    cursor: usize,
    /// Creations in flight outside the lock; they count against capacity
    pending: usize,
    stats: PoolStats,
    running: bool,
}

impl<C> PoolState<C> {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            available: Vec::new(),
            cursor: 0,
            pending: 0,
            stats: PoolStats::default(),
            running: false,
        }
    }

    fn occupancy(&self) -> usize {
        self.connections.len() + self.pending
    }

    fn refresh(&mut self) {
        let mut active = 0;
        let mut idle = 0;
        for entry in self.connections.values() {
            match entry.info.state {
                ConnectionState::InUse => active += 1,
                ConnectionState::Idle => idle += 1,
                _ => {}
            }
        }
        self.stats.set_gauges(self.connections.len(), active, idle);
    }
}

fn close_quietly<C: PoolableConnection>(id: ConnectionId, mut connection: C) {
    if let Err(e) = connection.close() {
        tracing::debug!(connection_id = %id, error = %e, "ignoring error while closing connection");
    }
}

/// A freshly opened connection that is not registered yet
struct Opened<C> {
    connection: C,
    host: String,
    attempt: u32,
    elapsed: Duration,
}

struct Shared<C: PoolableConnection> {
    config: ConnectionConfig,
    pool_config: PoolConfig,
    eviction: EvictionPolicy,
    factory: Box<dyn ConnectionFactory<C>>,
    state: Mutex<PoolState<C>>,
    callbacks: PoolCallbacks,
}

impl<C: PoolableConnection> Shared<C> {
    /// Open a new connection, retrying and rotating through failover hosts.
    /// The new entry is registered Idle but not made available.
    fn create_locked(&self, state: &mut PoolState<C>, events: &mut Vec<PoolEvent>) -> PoolResult<ConnectionId> {
        let opened = self.connect_with_retry();
        self.register_locked(state, opened, events)
    }

    /// Run the factory until it succeeds or the retry budget is spent.
    /// Touches no pool state, so it may run with or without the lock held.
    fn connect_with_retry(&self) -> PoolResult<Opened<C>> {
        let hosts = self.pool_config.host_rotation(&self.config.host);
        let attempts = self.pool_config.retry_attempts.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let host = hosts[attempt as usize % hosts.len()];
            let started = Instant::now();
            let result = if host == self.config.host {
                self.factory.connect(&self.config)
            } else {
                self.factory.connect(&self.config.for_host(host))
            };

            match result {
                Ok(connection) => {
                    return Ok(Opened {
                        connection,
                        host: host.to_string(),
                        attempt: attempt + 1,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        host,
                        attempt = attempt + 1,
                        attempts,
                        error = %last_error,
                        "connection attempt failed"
                    );
                    if attempt + 1 < attempts && !self.pool_config.retry_delay.is_zero() {
                        thread::sleep(self.pool_config.retry_delay);
                    }
                }
            }
        }

        tracing::error!(attempts, error = %last_error, "giving up on connection creation");
        Err(PoolError::Creation { attempts, last_error })
    }

    fn register_locked(
        &self,
        state: &mut PoolState<C>,
        opened: PoolResult<Opened<C>>,
        events: &mut Vec<PoolEvent>,
    ) -> PoolResult<ConnectionId> {
        let opened = match opened {
            Ok(opened) => opened,
            Err(e) => {
                state.stats.connection_errors += 1;
                return Err(e);
            }
        };

        let info = ConnectionInfo::new(&opened.host);
        let id = info.id;
        state.stats.record_connection_time(opened.elapsed);
        events.push(PoolEvent::Created(info.clone()));
        state.connections.insert(
            id,
            Entry {
                info,
                connection: Some(opened.connection),
            },
        );
        state.refresh();
        tracing::debug!(connection_id = %id, host = %opened.host, attempt = opened.attempt, "connection created");
        Ok(id)
    }

    /// Open one connection without holding the lock and make it available.
    ///
    /// A slot is reserved up front so concurrent lenders cannot overshoot
    /// `max_connections`. Returns `None` when the pool is already full.
    fn grow(&self) -> PoolResult<Option<ConnectionId>> {
        {
            let mut state = self.state.lock();
            if state.occupancy() >= self.pool_config.max_connections {
                return Ok(None);
            }
            state.pending += 1;
        }

        let opened = self.connect_with_retry();

        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            state.pending -= 1;
            let result = self.register_locked(&mut state, opened, &mut events);
            if let Ok(id) = &result {
                state.available.push(*id);
            }
            result
        };
        self.callbacks.dispatch(events);
        result.map(Some)
    }

    /// Remove an entry and dispose of it. `handle` is the lent-out connection, if the caller has it.
    fn remove_locked(
        &self,
        state: &mut PoolState<C>,
        id: ConnectionId,
        handle: Option<C>,
        events: &mut Vec<PoolEvent>,
    ) -> bool {
        state.available.retain(|available| *available != id);
        let Some(mut entry) = state.connections.remove(&id) else {
            if let Some(connection) = handle {
                close_quietly(id, connection);
            }
            return false;
        };

        if let Some(connection) = entry.connection.take().or(handle) {
            close_quietly(id, connection);
        }
        entry.info.state = ConnectionState::Closed;
        events.push(PoolEvent::Closed(entry.info));
        state.refresh();
        true
    }

    fn probe(&self, connection: &mut C) -> PoolResult<()> {
        connection
            .ping(&self.pool_config.health_check_query, self.pool_config.health_check_timeout)
            .map_err(|e| PoolError::Validation { reason: e.to_string() })
    }

    /// Top up the pool while it is below `min_connections`
    fn refill_locked(&self, state: &mut PoolState<C>, events: &mut Vec<PoolEvent>) -> usize {
        let mut created = 0;
        while state.connections.len() < self.pool_config.min_connections
            && state.occupancy() < self.pool_config.max_connections
        {
            match self.create_locked(state, events) {
                Ok(id) => {
                    state.available.push(id);
                    created += 1;
                }
                Err(_) => break,
            }
        }
        created
    }

    fn checkout_locked(&self, state: &mut PoolState<C>, id: ConnectionId) -> Option<C> {
        let entry = state.connections.get_mut(&id)?;
        let connection = entry.connection.take()?;
        entry.info.mark_in_use();
        state.refresh();
        Some(connection)
    }

    /// One lending attempt, counted as a request
    fn try_lend(self: &Arc<Self>) -> PoolResult<PooledConnection<C>> {
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            state.stats.connection_requests += 1;
            let result = self.lend_locked(&mut state, &mut events);
            if result.is_err() {
                self.record_exhaustion_locked(&mut state, &mut events);
            }
            result
        };
        self.callbacks.dispatch(events);
        result.map(|(id, connection)| self.guard(id, connection))
    }

    /// Lend an idle connection if one is available. Never creates.
    fn lend_idle(self: &Arc<Self>) -> Option<PooledConnection<C>> {
        let mut events = Vec::new();
        let lent = {
            let mut state = self.state.lock();
            self.lend_idle_locked(&mut state, &mut events)
        };
        self.callbacks.dispatch(events);
        lent.map(|(id, connection)| self.guard(id, connection))
    }

    fn guard(self: &Arc<Self>, id: ConnectionId, connection: C) -> PooledConnection<C> {
        PooledConnection {
            connection: Some(connection),
            id,
            pool: Arc::downgrade(self),
        }
    }

    fn has_capacity(&self) -> bool {
        self.state.lock().occupancy() < self.pool_config.max_connections
    }

    fn lend_idle_locked(&self, state: &mut PoolState<C>, events: &mut Vec<PoolEvent>) -> Option<(ConnectionId, C)> {
        let id = self.select_locked(state)?;
        if let Some(connection) = self.checkout_locked(state, id) {
            tracing::debug!(connection_id = %id, "lent idle connection");
            return Some((id, connection));
        }
        tracing::error!(connection_id = %id, "available connection had no handle; discarding");
        self.remove_locked(state, id, None, events);
        None
    }

    fn lend_locked(&self, state: &mut PoolState<C>, events: &mut Vec<PoolEvent>) -> PoolResult<(ConnectionId, C)> {
        if let Some(lent) = self.lend_idle_locked(state, events) {
            return Ok(lent);
        }

        if state.occupancy() >= self.pool_config.max_connections {
            return Err(PoolError::Exhausted {
                max_connections: self.pool_config.max_connections,
            });
        }

        let id = self.create_locked(state, events)?;
        match self.checkout_locked(state, id) {
            Some(connection) => {
                tracing::debug!(connection_id = %id, "lent new connection");
                Ok((id, connection))
            }
            None => Err(PoolError::Creation {
                attempts: 1,
                last_error: "new connection vanished before checkout".to_string(),
            }),
        }
    }

    /// Pick and remove an id from the available list
    fn select_locked(&self, state: &mut PoolState<C>) -> Option<ConnectionId> {
        let PoolState {
            connections,
            available,
            cursor,
            ..
        } = state;
        available.retain(|id| connections.contains_key(id));
        let candidates: Vec<&ConnectionInfo> = available
            .iter()
            .filter_map(|id| connections.get(id).map(|entry| &entry.info))
            .collect();

        let index = strategy::select(
            self.pool_config.strategy,
            &candidates,
            cursor,
            &mut rand::thread_rng(),
            Instant::now(),
        )?;
        Some(available.remove(index))
    }

    fn record_exhaustion_locked(&self, state: &mut PoolState<C>, events: &mut Vec<PoolEvent>) {
        state.stats.connection_timeouts += 1;
        events.push(PoolEvent::Exhausted);
        tracing::warn!(
            total = state.connections.len(),
            max = self.pool_config.max_connections,
            "no connection available"
        );
    }

    fn release(&self, id: ConnectionId, mut connection: C) -> bool {
        let mut events = Vec::new();
        let tracked = {
            let mut state = self.state.lock();
            let in_use = state
                .connections
                .get(&id)
                .is_some_and(|entry| entry.info.state == ConnectionState::InUse);

            if !in_use {
                drop(state);
                tracing::debug!(connection_id = %id, "released connection is not tracked; closing it");
                close_quietly(id, connection);
                false
            } else {
                let probe = if self.pool_config.enable_validation {
                    self.probe(&mut connection).map_err(|e| e.to_string())
                } else {
                    Ok(())
                };

                match probe {
                    Err(reason) => {
                        if let Some(entry) = state.connections.get_mut(&id) {
                            entry.info.record_probe_failure(&reason);
                            events.push(PoolEvent::Failed(entry.info.clone(), reason.clone()));
                        }
                        state.stats.failed_connections += 1;
                        tracing::warn!(connection_id = %id, error = %reason, "connection failed validation on release");
                        self.remove_locked(&mut state, id, Some(connection), &mut events);
                    }
                    Ok(()) if !self.pool_config.enable_reuse => {
                        tracing::debug!(connection_id = %id, "reuse disabled; closing released connection");
                        self.remove_locked(&mut state, id, Some(connection), &mut events);
                    }
                    Ok(()) => {
                        if let Some(entry) = state.connections.get_mut(&id) {
                            entry.connection = Some(connection);
                            entry.info.mark_idle();
                        }
                        state.available.push(id);
                        state.refresh();
                        tracing::debug!(connection_id = %id, "connection returned to pool");
                    }
                }
                true
            }
        };
        self.callbacks.dispatch(events);
        tracked
    }

    fn close(&self, id: ConnectionId, connection: C) -> bool {
        let mut events = Vec::new();
        let removed = {
            let mut state = self.state.lock();
            self.remove_locked(&mut state, id, Some(connection), &mut events)
        };
        self.callbacks.dispatch(events);
        if removed {
            tracing::debug!(connection_id = %id, "connection closed by caller");
        }
        removed
    }

    fn run_health_checks(&self) -> usize {
        let mut events = Vec::new();
        let failures = {
            let mut state = self.state.lock();
            let interval = self.pool_config.health_check_interval;
            let due: Vec<ConnectionId> = state
                .connections
                .iter()
                .filter(|(_, entry)| {
                    entry.info.state == ConnectionState::Idle && entry.info.needs_health_check(interval)
                })
                .map(|(id, _)| *id)
                .collect();

            let mut failures = 0;
            for id in due {
                let Some(entry) = state.connections.get_mut(&id) else {
                    continue;
                };
                entry.info.state = ConnectionState::Testing;
                let probe = match entry.connection.as_mut() {
                    Some(connection) => self.probe(connection).map_err(|e| e.to_string()),
                    None => Err("connection handle missing".to_string()),
                };

                match probe {
                    Ok(()) => entry.info.record_probe_success(),
                    Err(reason) => {
                        entry.info.record_probe_failure(&reason);
                        events.push(PoolEvent::HealthCheckFailed(entry.info.clone()));
                        events.push(PoolEvent::Failed(entry.info.clone(), reason.clone()));
                        state.stats.health_check_failures += 1;
                        state.stats.failed_connections += 1;
                        tracing::warn!(connection_id = %id, error = %reason, "health check failed; evicting");
                        self.remove_locked(&mut state, id, None, &mut events);
                        failures += 1;
                    }
                }
            }

            state.stats.last_health_check = Some(SystemTime::now());
            state.refresh();
            failures
        };
        self.callbacks.dispatch(events);
        failures
    }

    fn run_cleanup(&self) -> usize {
        let mut events = Vec::new();
        let evicted = {
            let mut state = self.state.lock();
            let expired: Vec<_> = state
                .connections
                .iter()
                .filter(|(_, entry)| entry.info.state == ConnectionState::Idle)
                .filter_map(|(id, entry)| self.eviction.evaluate(&entry.info).map(|reason| (*id, reason)))
                .collect();

            for (id, reason) in &expired {
                tracing::info!(connection_id = %id, %reason, "evicting connection");
                self.remove_locked(&mut state, *id, None, &mut events);
            }

            let created = self.refill_locked(&mut state, &mut events);
            if created > 0 {
                tracing::info!(created, total = state.connections.len(), "refilled pool to minimum");
            }
            expired.len()
        };
        self.callbacks.dispatch(events);
        evicted
    }
}

/// Thread-safe pool of backend connections
///
/// # Examples
///
/// ```
/// use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, PoolConfig, PoolableConnection};
/// use std::time::Duration;
///
/// struct Session;
///
/// impl PoolableConnection for Session {
///     fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// let pool = ConnectionPool::new(
///     ConnectionConfig::new("localhost", 5432, "app"),
///     PoolConfig::new().with_limits(1, 3, 2),
///     |_: &ConnectionConfig| -> Result<Session, BoxError> { Ok(Session) },
/// )
/// .unwrap();
///
/// pool.start().unwrap();
/// assert_eq!(pool.get_stats().stats.total_connections, 2);
/// {
///     let _conn = pool.get_connection(None).unwrap();
///     assert_eq!(pool.active_count(), 1);
///     // Connection automatically returned when `_conn` goes out of scope
/// }
/// assert_eq!(pool.available_count(), 2);
/// pool.stop();
/// ```
pub struct ConnectionPool<C: PoolableConnection> {
    shared: Arc<Shared<C>>,
    workers: Mutex<Vec<BackgroundWorker>>,
}

impl<C: PoolableConnection> ConnectionPool<C> {
    /// Create a pool. Both configurations are validated here.
    pub fn new<F>(config: ConnectionConfig, pool_config: PoolConfig, factory: F) -> PoolResult<Self>
    where
        F: ConnectionFactory<C>,
    {
        config.validate()?;
        pool_config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                eviction: EvictionPolicy::from_config(&pool_config),
                config,
                pool_config,
                factory: Box::new(factory),
                state: Mutex::new(PoolState::new()),
                callbacks: PoolCallbacks::default(),
            }),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Pre-create the initial connections and launch the background loops.
    ///
    /// Calling it on a running pool does nothing.
    pub fn start(&self) -> PoolResult<()> {
        let mut workers = self.workers.lock();
        let mut events = Vec::new();
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return Ok(());
            }
            state.running = true;

            let config = &self.shared.pool_config;
            let target = config.initial_connections.min(config.max_connections);
            while state.connections.len() < target && state.occupancy() < config.max_connections {
                match self.shared.create_locked(&mut state, &mut events) {
                    Ok(id) => state.available.push(id),
                    Err(e) => {
                        tracing::warn!(error = %e, "could not pre-create initial connection");
                        break;
                    }
                }
            }
            tracing::info!(
                total = state.connections.len(),
                min = config.min_connections,
                max = config.max_connections,
                strategy = ?config.strategy,
                "connection pool started"
            );
        }
        self.shared.callbacks.dispatch(events);

        match self.spawn_workers() {
            Ok(spawned) => {
                *workers = spawned;
                Ok(())
            }
            Err(e) => {
                drop(workers);
                self.stop();
                Err(e)
            }
        }
    }

    fn spawn_workers(&self) -> PoolResult<Vec<BackgroundWorker>> {
        let config = &self.shared.pool_config;
        let mut workers = Vec::new();

        if config.enable_health_checks {
            let shared = Arc::clone(&self.shared);
            let worker = BackgroundWorker::spawn("connpool-health", config.health_check_interval, move || {
                shared.run_health_checks();
            });
            workers.push(worker.map_err(|e| PoolError::Worker {
                name: "connpool-health".to_string(),
                reason: e.to_string(),
            })?);
        }

        let shared = Arc::clone(&self.shared);
        let worker = BackgroundWorker::spawn("connpool-cleanup", config.cleanup_interval, move || {
            shared.run_cleanup();
        });
        match worker {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                for worker in workers {
                    worker.stop(config.shutdown_timeout);
                }
                return Err(PoolError::Worker {
                    name: "connpool-cleanup".to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(workers)
    }

    /// Stop the background loops and dispose every tracked connection.
    ///
    /// Connections on loan are forgotten; returning them later closes them.
    pub fn stop(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            tracing::debug!(worker = worker.name(), "stopping background worker");
            worker.stop(self.shared.pool_config.shutdown_timeout);
        }

        let mut events = Vec::new();
        {
            let mut state = self.shared.state.lock();
            if !state.running && state.connections.is_empty() {
                return;
            }
            state.running = false;

            let ids: Vec<ConnectionId> = state.connections.keys().copied().collect();
            let disposed = ids.len();
            for id in ids {
                self.shared.remove_locked(&mut state, id, None, &mut events);
            }
            state.available.clear();
            state.cursor = 0;
            state.refresh();
            tracing::info!(disposed, "connection pool stopped");
        }
        self.shared.callbacks.dispatch(events);
    }

    /// Whether `start()` has been called without a matching `stop()`
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Lend a connection.
    ///
    /// This makes exactly one attempt: an idle connection chosen by the
    /// configured strategy, else a freshly created one if below capacity.
    /// It never waits for another caller to release; `timeout` is accepted
    /// for call-site symmetry with [`get_connection_async`](Self::get_connection_async)
    /// and is otherwise unused.
    pub fn get_connection(&self, timeout: Option<Duration>) -> PoolResult<PooledConnection<C>> {
        if let Some(timeout) = timeout {
            tracing::trace!(?timeout, "one-shot lend ignores timeout");
        }
        self.shared.try_lend()
    }

    /// Lend a connection, returning `None` instead of an error
    pub fn try_get_connection(&self) -> Option<PooledConnection<C>> {
        self.get_connection(None).ok()
    }

    /// Lend a connection, waiting up to `timeout` (default `connection_timeout`)
    /// for one to become available.
    ///
    /// Unlike [`get_connection`](Self::get_connection) this polls idle
    /// connections until the deadline. If the pool has spare capacity, one
    /// connection is opened on the blocking thread pool and joins the idle
    /// set when ready, so slow or retrying creation never holds up the
    /// deadline. The request and any exhaustion are counted once per call.
    pub async fn get_connection_async(&self, timeout: Option<Duration>) -> PoolResult<PooledConnection<C>> {
        let timeout = timeout.unwrap_or(self.shared.pool_config.connection_timeout);
        self.shared.state.lock().stats.connection_requests += 1;

        let shared = &self.shared;
        let result = tokio::time::timeout(timeout, async {
            let mut growing = false;
            loop {
                if let Some(conn) = shared.lend_idle() {
                    return conn;
                }
                if !growing && shared.has_capacity() {
                    growing = true;
                    let grower = Arc::clone(shared);
                    tokio::task::spawn_blocking(move || {
                        if let Err(e) = grower.grow() {
                            tracing::debug!(error = %e, "could not open a connection for async lend");
                        }
                    });
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match result {
            Ok(conn) => Ok(conn),
            Err(_) => {
                let mut events = Vec::new();
                {
                    let mut state = self.shared.state.lock();
                    self.shared.record_exhaustion_locked(&mut state, &mut events);
                }
                self.shared.callbacks.dispatch(events);
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    fn owns(&self, conn: &PooledConnection<C>) -> bool {
        std::ptr::eq(conn.pool.as_ptr(), Arc::as_ptr(&self.shared))
    }

    /// Return a connection to the pool.
    ///
    /// With validation enabled the connection is probed first and evicted if
    /// the probe fails; with reuse disabled it is closed. Returns false if the
    /// connection belongs to another pool or is no longer tracked.
    pub fn release_connection(&self, mut conn: PooledConnection<C>) -> bool {
        if !self.owns(&conn) {
            return false;
        }
        match conn.connection.take() {
            Some(connection) => self.shared.release(conn.id, connection),
            None => false,
        }
    }

    /// Dispose of a lent connection instead of returning it.
    ///
    /// Returns false if the connection belongs to another pool or is no
    /// longer tracked; close errors are ignored.
    pub fn close_connection(&self, mut conn: PooledConnection<C>) -> bool {
        if !self.owns(&conn) {
            return false;
        }
        match conn.connection.take() {
            Some(connection) => self.shared.close(conn.id, connection),
            None => false,
        }
    }

    /// Probe every idle connection that is due and evict the ones that fail.
    ///
    /// This is one pass of the background health-check loop. Returns the
    /// number of failed probes.
    pub fn run_health_checks(&self) -> usize {
        self.shared.run_health_checks()
    }

    /// Evict expired idle connections and refill to `min_connections`.
    ///
    /// This is one pass of the background cleanup loop. Returns the number
    /// of evicted connections.
    pub fn run_cleanup(&self) -> usize {
        self.shared.run_cleanup()
    }

    /// Feed a query latency into the running average
    pub fn record_query_time(&self, elapsed: Duration) {
        self.shared.state.lock().stats.record_query_time(elapsed);
    }

    /// Snapshot of the pool statistics
    pub fn get_stats(&self) -> PoolStatsSnapshot {
        let mut state = self.shared.state.lock();
        state.refresh();
        let config = &self.shared.pool_config;
        PoolStatsSnapshot {
            stats: state.stats.clone(),
            min_connections: config.min_connections,
            max_connections: config.max_connections,
            strategy: config.strategy,
        }
    }

    /// Get health status
    pub fn get_health_status(&self) -> PoolHealth {
        PoolHealth::from_snapshot(&self.get_stats())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_stats().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_stats(), pool_name, tags)
    }

    /// Metadata of one tracked connection
    pub fn connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.shared.state.lock().connections.get(&id).map(|entry| entry.info.clone())
    }

    /// Metadata of every tracked connection, oldest first
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let state = self.shared.state.lock();
        let mut infos: Vec<_> = state.connections.values().map(|entry| entry.info.clone()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.shared.state.lock().available.len()
    }

    /// Get active count
    pub fn active_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .connections
            .values()
            .filter(|entry| entry.info.state == ConnectionState::InUse)
            .count()
    }

    /// The pool's connection configuration
    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// The pool's behavioural configuration
    pub fn pool_config(&self) -> &PoolConfig {
        &self.shared.pool_config
    }

    pub fn set_on_connection_created<F>(&self, f: F)
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_created(Arc::new(f));
    }

    pub fn set_on_connection_closed<F>(&self, f: F)
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_closed(Arc::new(f));
    }

    pub fn set_on_connection_failed<F>(&self, f: F)
    where
        F: Fn(&ConnectionInfo, &str) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_failed(Arc::new(f));
    }

    pub fn set_on_health_check_failed<F>(&self, f: F)
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_health_check_failed(Arc::new(f));
    }

    pub fn set_on_pool_exhausted<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_exhausted(Arc::new(f));
    }
}

impl<C: PoolableConnection> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
