//! Pool-level health reporting

use crate::metrics::PoolStatsSnapshot;

/// Health report for a connection pool
///
/// # Examples
///
/// ```
/// use esox_connpool::{LendingStrategy, PoolHealth, PoolStats, PoolStatsSnapshot};
///
/// let mut stats = PoolStats::default();
/// stats.total_connections = 2;
/// stats.idle_connections = 2;
///
/// let health = PoolHealth::from_snapshot(&PoolStatsSnapshot {
///     stats,
///     min_connections: 2,
///     max_connections: 4,
///     strategy: LendingStrategy::RoundRobin,
/// });
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_connections, 2);
/// ```
#[derive(Debug, Clone)]
pub struct PoolHealth {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Active connections relative to `max_connections` (0.0 to 1.0).
    /// `PoolStats::utilization` is relative to the tracked total instead.
    pub capacity_utilization: f64,

    /// Connections ready to lend
    pub idle_connections: usize,

    /// Connections lent out
    pub active_connections: usize,

    /// Configured capacity
    pub max_connections: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl PoolHealth {
    pub fn from_snapshot(snapshot: &PoolStatsSnapshot) -> Self {
        let stats = &snapshot.stats;
        let capacity_utilization = if snapshot.max_connections > 0 {
            stats.active_connections as f64 / snapshot.max_connections as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if capacity_utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}% of capacity", capacity_utilization * 100.0));
            is_healthy = false;
        }

        if stats.total_connections < snapshot.min_connections {
            warnings.push(format!(
                "Below minimum: {} of {} connections",
                stats.total_connections, snapshot.min_connections
            ));
            is_healthy = false;
        }

        if stats.idle_connections == 0 && stats.total_connections > 0 {
            warnings.push("No idle connections".to_string());
        }

        if stats.health_check_failures > 0 {
            warnings.push(format!("{} failed health checks", stats.health_check_failures));
        }

        if stats.connection_errors > 0 {
            warnings.push(format!("{} failed connection attempts", stats.connection_errors));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            capacity_utilization,
            idle_connections: stats.idle_connections,
            active_connections: stats.active_connections,
            max_connections: snapshot.max_connections,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingStrategy;
    use crate::metrics::PoolStats;

    fn snapshot(total: usize, active: usize, idle: usize, min: usize, max: usize) -> PoolStatsSnapshot {
        let mut stats = PoolStats::default();
        stats.total_connections = total;
        stats.active_connections = active;
        stats.idle_connections = idle;
        PoolStatsSnapshot {
            stats,
            min_connections: min,
            max_connections: max,
            strategy: LendingStrategy::RoundRobin,
        }
    }

    #[test]
    fn test_saturated_pool_is_unhealthy() {
        let health = PoolHealth::from_snapshot(&snapshot(10, 10, 0, 2, 10));
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert_eq!(health.capacity_utilization, 1.0);
    }

    #[test]
    fn test_capacity_utilization_is_relative_to_max() {
        let mut snap = snapshot(2, 2, 0, 0, 10);
        snap.stats.set_gauges(2, 2, 0);
        let health = PoolHealth::from_snapshot(&snap);
        assert_eq!(snap.stats.utilization, 1.0);
        assert!((health.capacity_utilization - 0.2).abs() < 1e-9);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_below_minimum_is_unhealthy() {
        let health = PoolHealth::from_snapshot(&snapshot(1, 0, 1, 3, 10));
        assert!(!health.is_healthy());
        assert!(health.warnings[0].starts_with("Below minimum"));
    }

    #[test]
    fn test_failures_only_warn() {
        let mut snap = snapshot(3, 1, 2, 2, 10);
        snap.stats.health_check_failures = 2;
        let health = PoolHealth::from_snapshot(&snap);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 1);
    }
}
