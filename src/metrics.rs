//! Pool statistics and metrics export

use crate::config::LendingStrategy;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters and gauges describing pool behaviour
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStats {
    /// Connections currently tracked
    pub total_connections: usize,

    /// Connections lent to callers
    pub active_connections: usize,

    /// Connections ready to lend
    pub idle_connections: usize,

    /// Connections evicted after a failed probe
    pub failed_connections: usize,

    /// Lend calls made
    pub connection_requests: u64,

    /// Lend calls that came back empty-handed
    pub connection_timeouts: u64,

    /// Creations that failed after every retry
    pub connection_errors: u64,

    /// Running mean of successful creation latency
    pub avg_connection_time: Duration,

    /// Running mean of reported query latency
    pub avg_query_time: Duration,

    /// Failed background probes
    pub health_check_failures: u64,

    /// Wall-clock time of the last health-check pass
    pub last_health_check: Option<SystemTime>,

    /// active / total (0.0 to 1.0)
    pub utilization: f64,

    #[cfg_attr(feature = "serde", serde(skip))]
    connection_time_samples: u64,

    #[cfg_attr(feature = "serde", serde(skip))]
    query_time_samples: u64,
}

fn running_mean(mean: Duration, samples: u64, sample: Duration) -> Duration {
    let mean = mean.as_secs_f64();
    Duration::from_secs_f64(mean + (sample.as_secs_f64() - mean) / samples as f64)
}

impl PoolStats {
    pub(crate) fn record_connection_time(&mut self, elapsed: Duration) {
        self.connection_time_samples += 1;
        self.avg_connection_time =
            running_mean(self.avg_connection_time, self.connection_time_samples, elapsed);
    }

    pub(crate) fn record_query_time(&mut self, elapsed: Duration) {
        self.query_time_samples += 1;
        self.avg_query_time = running_mean(self.avg_query_time, self.query_time_samples, elapsed);
    }

    pub(crate) fn set_gauges(&mut self, total: usize, active: usize, idle: usize) {
        self.total_connections = total;
        self.active_connections = active;
        self.idle_connections = idle;
        self.utilization = if total > 0 {
            active as f64 / total as f64
        } else {
            0.0
        };
    }
}

/// Point-in-time copy of the pool statistics plus the effective limits
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionConfig, ConnectionPool, PoolConfig, PoolableConnection, BoxError};
/// use std::time::Duration;
///
/// struct Noop;
/// impl PoolableConnection for Noop {
///     fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> { Ok(()) }
/// }
///
/// let pool = ConnectionPool::new(
///     ConnectionConfig::new("localhost", 5432, "app"),
///     PoolConfig::new().with_limits(1, 4, 1).without_health_checks(),
///     |_: &ConnectionConfig| -> Result<Noop, BoxError> { Ok(Noop) },
/// ).unwrap();
///
/// let conn = pool.get_connection(None).unwrap();
/// let stats = pool.get_stats();
/// assert_eq!(stats.stats.connection_requests, 1);
/// assert_eq!(stats.stats.active_connections, 1);
/// assert_eq!(stats.max_connections, 4);
/// drop(conn);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStatsSnapshot {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub stats: PoolStats,
    pub min_connections: usize,
    pub max_connections: usize,
    pub strategy: LendingStrategy,
}

impl PoolStatsSnapshot {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let s = &self.stats;
        let mut metrics = HashMap::new();
        metrics.insert("total_connections".to_string(), s.total_connections.to_string());
        metrics.insert("active_connections".to_string(), s.active_connections.to_string());
        metrics.insert("idle_connections".to_string(), s.idle_connections.to_string());
        metrics.insert("failed_connections".to_string(), s.failed_connections.to_string());
        metrics.insert("connection_requests".to_string(), s.connection_requests.to_string());
        metrics.insert("connection_timeouts".to_string(), s.connection_timeouts.to_string());
        metrics.insert("connection_errors".to_string(), s.connection_errors.to_string());
        metrics.insert("health_check_failures".to_string(), s.health_check_failures.to_string());
        metrics.insert(
            "avg_connection_time_ms".to_string(),
            format!("{:.3}", s.avg_connection_time.as_secs_f64() * 1000.0),
        );
        metrics.insert(
            "avg_query_time_ms".to_string(),
            format!("{:.3}", s.avg_query_time.as_secs_f64() * 1000.0),
        );
        metrics.insert("utilization".to_string(), format!("{:.2}", s.utilization));
        metrics.insert("min_connections".to_string(), self.min_connections.to_string());
        metrics.insert("max_connections".to_string(), self.max_connections.to_string());
        metrics.insert("strategy".to_string(), format!("{:?}", self.strategy));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export a snapshot in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connpool::{MetricsExporter, PoolStatsSnapshot, PoolStats, LendingStrategy};
    /// use std::collections::HashMap;
    ///
    /// let snapshot = PoolStatsSnapshot {
    ///     stats: PoolStats::default(),
    ///     min_connections: 1,
    ///     max_connections: 4,
    ///     strategy: LendingStrategy::RoundRobin,
    /// };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&snapshot, "orders", Some(&tags)).unwrap();
    /// assert!(output.contains("connpool_connections_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        snapshot: &PoolStatsSnapshot,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::errors::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let registry = Registry::new();
        let s = &snapshot.stats;

        // Gauge metrics
        for (name, help, value) in [
            ("connpool_connections_total", "Tracked connections", s.total_connections),
            ("connpool_connections_active", "Connections lent to callers", s.active_connections),
            ("connpool_connections_idle", "Connections ready to lend", s.idle_connections),
            ("connpool_connections_failed", "Connections evicted after a failed probe", s.failed_connections),
            ("connpool_connections_max", "Configured capacity", snapshot.max_connections),
        ] {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        for (name, help, value) in [
            ("connpool_utilization", "Active / total connections", s.utilization),
            (
                "connpool_connection_time_seconds_avg",
                "Mean connection creation latency",
                s.avg_connection_time.as_secs_f64(),
            ),
            (
                "connpool_query_time_seconds_avg",
                "Mean reported query latency",
                s.avg_query_time.as_secs_f64(),
            ),
        ] {
            let gauge = Gauge::with_opts(opts(name, help))?;
            gauge.set(value);
            registry.register(Box::new(gauge))?;
        }

        // Counter metrics
        for (name, help, value) in [
            ("connpool_requests_total", "Lend calls", s.connection_requests),
            ("connpool_timeouts_total", "Lend calls with no connection", s.connection_timeouts),
            ("connpool_errors_total", "Failed connection creations", s.connection_errors),
            ("connpool_health_check_failures_total", "Failed health probes", s.health_check_failures),
        ] {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::errors::PoolError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_means() {
        let mut stats = PoolStats::default();
        stats.record_connection_time(Duration::from_millis(10));
        stats.record_connection_time(Duration::from_millis(30));
        assert!((stats.avg_connection_time.as_secs_f64() - 0.020).abs() < 1e-6);

        stats.record_query_time(Duration::from_millis(4));
        assert!((stats.avg_query_time.as_secs_f64() - 0.004).abs() < 1e-6);
    }

    #[test]
    fn test_utilization() {
        let mut stats = PoolStats::default();
        stats.set_gauges(0, 0, 0);
        assert_eq!(stats.utilization, 0.0);

        stats.set_gauges(4, 1, 3);
        assert!((stats.utilization - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_map() {
        let mut stats = PoolStats::default();
        stats.set_gauges(2, 1, 1);
        let snapshot = PoolStatsSnapshot {
            stats,
            min_connections: 1,
            max_connections: 3,
            strategy: LendingStrategy::Weighted,
        };

        let exported = snapshot.export();
        assert_eq!(exported["active_connections"], "1");
        assert_eq!(exported["utilization"], "0.50");
        assert_eq!(exported["strategy"], "Weighted");
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_rejects_bad_label() {
        let snapshot = PoolStatsSnapshot {
            stats: PoolStats::default(),
            min_connections: 0,
            max_connections: 1,
            strategy: LendingStrategy::Random,
        };
        let mut tags = HashMap::new();
        tags.insert("not a label".to_string(), "x".to_string());

        let err = MetricsExporter::export_prometheus(&snapshot, "p", Some(&tags)).unwrap_err();
        assert!(matches!(err, crate::errors::PoolError::Metrics(_)));
    }
}
