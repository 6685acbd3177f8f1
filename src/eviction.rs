//! Eviction policies for idle and aged-out connections

use crate::config::PoolConfig;
use crate::connection::ConnectionInfo;
use std::fmt;
use std::time::Duration;

/// Eviction policy for pooled connections, derived from a [`PoolConfig`]
///
/// # Examples
///
/// ```
/// use esox_connpool::{EvictionPolicy, PoolConfig};
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_max_lifetime(Some(Duration::from_secs(3600)))
///     .with_idle_timeout(None);
///
/// assert_eq!(
///     EvictionPolicy::from_config(&config),
///     EvictionPolicy::MaxLifetime(Duration::from_secs(3600))
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// No eviction
    #[default]
    None,

    /// Connections expire after a fixed age
    MaxLifetime(Duration),

    /// Connections expire after sitting idle
    IdleTimeout(Duration),

    /// Max lifetime or idle timeout, whichever trips first
    Combined {
        max_lifetime: Duration,
        idle_timeout: Duration,
    },
}

/// Why a connection was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    MaxLifetime,
    IdleTimeout,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::MaxLifetime => f.write_str("max lifetime exceeded"),
            EvictionReason::IdleTimeout => f.write_str("idle timeout exceeded"),
        }
    }
}

impl EvictionPolicy {
    pub fn from_config(config: &PoolConfig) -> Self {
        match (config.max_lifetime, config.idle_timeout) {
            (Some(max_lifetime), Some(idle_timeout)) => EvictionPolicy::Combined {
                max_lifetime,
                idle_timeout,
            },
            (Some(max_lifetime), None) => EvictionPolicy::MaxLifetime(max_lifetime),
            (None, Some(idle_timeout)) => EvictionPolicy::IdleTimeout(idle_timeout),
            (None, None) => EvictionPolicy::None,
        }
    }

    /// Reason the connection should be evicted, if any. Lifetime wins over idleness.
    pub fn evaluate(&self, info: &ConnectionInfo) -> Option<EvictionReason> {
        let (max_lifetime, idle_timeout) = match *self {
            EvictionPolicy::None => return None,
            EvictionPolicy::MaxLifetime(ttl) => (Some(ttl), None),
            EvictionPolicy::IdleTimeout(idle) => (None, Some(idle)),
            EvictionPolicy::Combined {
                max_lifetime,
                idle_timeout,
            } => (Some(max_lifetime), Some(idle_timeout)),
        };

        if max_lifetime.is_some_and(|ttl| info.age() > ttl) {
            Some(EvictionReason::MaxLifetime)
        } else if idle_timeout.is_some_and(|idle| info.idle_time() > idle) {
            Some(EvictionReason::IdleTimeout)
        } else {
            None
        }
    }
}
