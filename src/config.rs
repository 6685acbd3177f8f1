//! Connection and pool configuration

use crate::errors::{PoolError, PoolResult};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// TLS negotiation mode for backend connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TlsMode {
    /// Plain text only
    #[default]
    Disabled,

    /// Use TLS when the server offers it
    Preferred,

    /// Fail if TLS cannot be negotiated
    Required,

    /// Require TLS and verify the server certificate against the CA
    VerifyCa,

    /// Like `VerifyCa`, and also verify the server host name
    VerifyIdentity,
}

impl TlsMode {
    fn needs_ca(self) -> bool {
        matches!(self, TlsMode::VerifyCa | TlsMode::VerifyIdentity)
    }
}

/// Parameters identifying and authenticating against a backend endpoint.
///
/// The pool never interprets these beyond validation; they are handed to the
/// connection factory unchanged (apart from the host, which may be swapped for
/// a failover host on retry).
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionConfig, TlsMode};
/// use std::time::Duration;
///
/// let config = ConnectionConfig::new("db.internal", 3306, "orders")
///     .with_credentials("app", "s3cret")
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_tls(TlsMode::Required);
///
/// assert!(config.validate().is_ok());
/// assert!(!format!("{:?}", config).contains("s3cret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// Backend host name or address
    pub host: String,

    /// Backend port (1-65535)
    pub port: u16,

    /// Database / schema name
    pub database: String,

    /// User name
    pub username: String,

    /// Password
    #[cfg_attr(feature = "serde", serde(skip_serializing))]
    pub password: String,

    /// Character set negotiated on connect
    pub charset: String,

    /// Whether statements auto-commit
    pub autocommit: bool,

    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// Socket read timeout
    pub read_timeout: Duration,

    /// Socket write timeout
    pub write_timeout: Duration,

    /// TLS mode
    pub tls_mode: TlsMode,

    /// CA certificate used to verify the server
    pub tls_ca_cert: Option<PathBuf>,

    /// Client certificate for mutual TLS
    pub tls_client_cert: Option<PathBuf>,

    /// Client private key for mutual TLS
    pub tls_client_key: Option<PathBuf>,

    /// Largest packet the client accepts, in bytes
    pub max_packet_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            charset: "utf8mb4".to_string(),
            autocommit: true,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            tls_mode: TlsMode::Disabled,
            tls_ca_cert: None,
            tls_client_cert: None,
            tls_client_key: None,
            max_packet_size: 16 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("charset", &self.charset)
            .field("autocommit", &self.autocommit)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("tls_mode", &self.tls_mode)
            .field("tls_ca_cert", &self.tls_ca_cert)
            .field("tls_client_cert", &self.tls_client_cert)
            .field("tls_client_key", &self.tls_client_key)
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration for the given endpoint with default options
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            ..Self::default()
        }
    }

    /// Set user name and password
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the character set
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Enable or disable autocommit
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read and write timeouts
    pub fn with_io_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    /// Set the TLS mode
    pub fn with_tls(mut self, mode: TlsMode) -> Self {
        self.tls_mode = mode;
        self
    }

    /// Set TLS certificate paths
    pub fn with_tls_files(
        mut self,
        ca_cert: Option<PathBuf>,
        client_cert: Option<PathBuf>,
        client_key: Option<PathBuf>,
    ) -> Self {
        self.tls_ca_cert = ca_cert;
        self.tls_client_cert = client_cert;
        self.tls_client_key = client_key;
        self
    }

    /// Set the maximum packet size
    pub fn with_max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Copy of this configuration pointing at another host
    pub(crate) fn for_host(&self, host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..self.clone()
        }
    }

    /// Check every field constraint
    pub fn validate(&self) -> PoolResult<()> {
        if self.host.trim().is_empty() {
            return Err(PoolError::config("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(PoolError::config("port", "must be between 1 and 65535"));
        }
        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if value.is_zero() {
                return Err(PoolError::config(field, "must be greater than zero"));
            }
        }
        if self.max_packet_size == 0 {
            return Err(PoolError::config("max_packet_size", "must be greater than zero"));
        }
        if self.tls_mode.needs_ca() && self.tls_ca_cert.is_none() {
            return Err(PoolError::config(
                "tls_ca_cert",
                format!("required when tls_mode is {:?}", self.tls_mode),
            ));
        }
        if self.tls_client_cert.is_some() != self.tls_client_key.is_some() {
            return Err(PoolError::config(
                "tls_client_key",
                "client certificate and key must be given together",
            ));
        }
        Ok(())
    }
}

/// Rule used to choose which idle connection is lent next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LendingStrategy {
    /// Cycle through the available connections
    #[default]
    RoundRobin,

    /// Prefer the connection with the lowest use count
    LeastConnections,

    /// Prefer the lowest `use_count * seconds_since_last_use`
    Weighted,

    /// Uniform random choice
    Random,
}

/// Behavioural policy for a connection pool
///
/// # Examples
///
/// ```
/// use esox_connpool::{LendingStrategy, PoolConfig};
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_limits(2, 5, 3)
///     .with_strategy(LendingStrategy::LeastConnections)
///     .with_retry(2, Duration::from_millis(100));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_connections, 5);
///
/// let invalid = PoolConfig::new().with_limits(4, 2, 3);
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Floor the cleanup pass refills to
    pub min_connections: usize,

    /// Hard capacity
    pub max_connections: usize,

    /// Connections created by `start()`
    pub initial_connections: usize,

    /// Default wait for the async lend
    pub connection_timeout: Duration,

    /// Idle connections older than this are evicted (`None` disables)
    pub idle_timeout: Option<Duration>,

    /// Connections older than this are evicted (`None` disables)
    pub max_lifetime: Option<Duration>,

    /// Interval between health-check passes, also the staleness threshold
    pub health_check_interval: Duration,

    /// Timeout handed to each probe
    pub health_check_timeout: Duration,

    /// Query handed to each probe
    pub health_check_query: String,

    /// Run the background health-check loop
    pub enable_health_checks: bool,

    /// Probe connections when they are released
    pub enable_validation: bool,

    /// Return released connections to the pool instead of closing them
    pub enable_reuse: bool,

    /// Lending strategy
    pub strategy: LendingStrategy,

    /// Extra creation attempts after the first one fails
    pub retry_attempts: u32,

    /// Pause between creation attempts
    pub retry_delay: Duration,

    /// Hosts tried in turn when the primary fails
    pub failover_hosts: Vec<String>,

    /// Interval between cleanup passes
    pub cleanup_interval: Duration,

    /// How long `stop()` waits for each background worker
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            initial_connections: 2,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(300)),
            max_lifetime: Some(Duration::from_secs(3600)),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            health_check_query: "SELECT 1".to_string(),
            enable_health_checks: true,
            enable_validation: true,
            enable_reuse: true,
            strategy: LendingStrategy::RoundRobin,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            failover_hosts: Vec::new(),
            cleanup_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set min, max and initial connection counts
    pub fn with_limits(mut self, min: usize, max: usize, initial: usize) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self.initial_connections = initial;
        self
    }

    /// Set the async lend timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum lifetime
    pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Configure health checking
    pub fn with_health_check(mut self, interval: Duration, timeout: Duration, query: impl Into<String>) -> Self {
        self.enable_health_checks = true;
        self.health_check_interval = interval;
        self.health_check_timeout = timeout;
        self.health_check_query = query.into();
        self
    }

    /// Disable the background health-check loop
    pub fn without_health_checks(mut self) -> Self {
        self.enable_health_checks = false;
        self
    }

    /// Enable or disable validation on release
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    /// Enable or disable connection reuse
    pub fn with_reuse(mut self, enabled: bool) -> Self {
        self.enable_reuse = enabled;
        self
    }

    /// Set the lending strategy
    pub fn with_strategy(mut self, strategy: LendingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set retry attempts and delay for connection creation
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Set failover hosts
    pub fn with_failover_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failover_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the cleanup cadence
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the bounded wait used by `stop()`
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Check every field constraint
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_connections == 0 {
            return Err(PoolError::config("max_connections", "must be greater than zero"));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::config(
                "min_connections",
                format!(
                    "({}) must not exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            ));
        }
        if self.initial_connections < self.min_connections
            || self.initial_connections > self.max_connections
        {
            return Err(PoolError::config(
                "initial_connections",
                format!(
                    "({}) must lie between min_connections ({}) and max_connections ({})",
                    self.initial_connections, self.min_connections, self.max_connections
                ),
            ));
        }
        for (field, value) in [
            ("connection_timeout", self.connection_timeout),
            ("health_check_interval", self.health_check_interval),
            ("health_check_timeout", self.health_check_timeout),
            ("cleanup_interval", self.cleanup_interval),
        ] {
            if value.is_zero() {
                return Err(PoolError::config(field, "must be greater than zero"));
            }
        }
        if self.idle_timeout.is_some_and(|d| d.is_zero()) {
            return Err(PoolError::config("idle_timeout", "must be greater than zero when set"));
        }
        if self.max_lifetime.is_some_and(|d| d.is_zero()) {
            return Err(PoolError::config("max_lifetime", "must be greater than zero when set"));
        }
        if self.failover_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(PoolError::config("failover_hosts", "must not contain empty host names"));
        }
        Ok(())
    }

    /// Primary host followed by the failover hosts, in attempt order
    pub(crate) fn host_rotation<'a>(&'a self, primary: &'a str) -> Vec<&'a str> {
        std::iter::once(primary)
            .chain(self.failover_hosts.iter().map(String::as_str))
            .collect()
    }
}
