//! Client configuration types and builders.

use std::net::SocketAddr;
use std::time::Duration;

use hazelcast_core::protocol::{DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE};
use hazelcast_core::HazelcastError;
use rand::Rng;

/// Default cluster name.
const DEFAULT_CLUSTER_NAME: &str = "dev";
/// Password sent when none is configured.
const DEFAULT_PASSWORD: &str = "dev-pass";
/// Default member port.
const DEFAULT_PORT: u16 = 5701;
/// Default connection timeout.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Default heartbeat interval.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Default silence after which a connection is considered dead.
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default initial retry backoff.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Default maximum retry backoff.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Default retry multiplier.
const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
/// Default maximum retry attempts.
const DEFAULT_MAX_RETRIES: u32 = 10;
/// Default retry jitter.
const DEFAULT_JITTER: f64 = 0.2;
/// Default bound on a whole invocation, retries included.
const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(120);
/// Default partition table refresh period.
const DEFAULT_PARTITION_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
/// Default bound on a class definition fetch.
const DEFAULT_SCHEMA_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the validation message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for HazelcastError {
    fn from(error: ConfigError) -> Self {
        HazelcastError::Configuration(error.message)
    }
}

fn require_positive(value: Duration, name: &str) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::new(format!("{} must be greater than zero", name)));
    }
    Ok(())
}

/// Network configuration for cluster connections.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    addresses: Vec<SocketAddr>,
    connection_timeout: Duration,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    max_frame_size: usize,
}

impl NetworkConfig {
    /// Returns the configured cluster member addresses.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Returns the connection timeout duration.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Returns how often idle connections are pinged.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Returns how long a connection may stay silent before it is closed.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Returns the largest inbound frame accepted.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            addresses: vec![default_address()],
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
}

/// Builder for `NetworkConfig`.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigBuilder {
    addresses: Vec<SocketAddr>,
    connection_timeout: Option<Duration>,
    heartbeat_interval: Option<Duration>,
    heartbeat_timeout: Option<Duration>,
    max_frame_size: Option<usize>,
}

impl NetworkConfigBuilder {
    /// Creates a new network configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cluster member address.
    pub fn add_address(mut self, address: SocketAddr) -> Self {
        self.addresses.push(address);
        self
    }

    /// Sets the cluster member addresses, replacing any previously configured.
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    /// Sets the connection timeout duration.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the heartbeat interval duration.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    /// Sets the largest inbound frame accepted.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Builds the network configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - a timeout or interval is zero
    /// - `heartbeat_timeout` is shorter than `heartbeat_interval`
    /// - `max_frame_size` cannot hold a frame header
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        let addresses = if self.addresses.is_empty() {
            vec![default_address()]
        } else {
            self.addresses
        };
        let connection_timeout = self.connection_timeout.unwrap_or(DEFAULT_CONNECTION_TIMEOUT);
        let heartbeat_interval = self.heartbeat_interval.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL);
        let heartbeat_timeout = self.heartbeat_timeout.unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT);
        let max_frame_size = self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);

        require_positive(connection_timeout, "connection_timeout")?;
        require_positive(heartbeat_interval, "heartbeat_interval")?;
        if heartbeat_timeout < heartbeat_interval {
            return Err(ConfigError::new(
                "heartbeat_timeout must not be shorter than heartbeat_interval",
            ));
        }
        if max_frame_size < HEADER_SIZE {
            return Err(ConfigError::new(format!(
                "max_frame_size must be at least {} bytes",
                HEADER_SIZE
            )));
        }

        Ok(NetworkConfig {
            addresses,
            connection_timeout,
            heartbeat_interval,
            heartbeat_timeout,
            max_frame_size,
        })
    }
}

/// Backoff policy for resending retryable invocations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    max_retries: u32,
    jitter: f64,
}

impl RetryConfig {
    /// Returns the initial backoff duration.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Returns the maximum backoff duration.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Returns the backoff multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Returns the maximum number of resends after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the jitter factor in `[0, 1)`.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns the delay before retry number `retry` (0-based):
    /// `initial * multiplier^retry`, jittered, capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let factor = if self.jitter > 0.0 {
            1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            1.0
        };
        let max = self.max_backoff.as_secs_f64();
        Duration::from_secs_f64((base * factor).clamp(0.0, max))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_retries: DEFAULT_MAX_RETRIES,
            jitter: DEFAULT_JITTER,
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    max_retries: Option<u32>,
    jitter: Option<f64>,
}

impl RetryConfigBuilder {
    /// Creates a new retry configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial backoff duration.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Sets the maximum number of resends after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the jitter factor. `0.2` spreads each delay over ±20%.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Builds the retry configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `initial_backoff` exceeds `max_backoff`
    /// - `multiplier` is less than 1.0
    /// - `jitter` is outside `[0, 1)`
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        let initial_backoff = self.initial_backoff.unwrap_or(DEFAULT_INITIAL_BACKOFF);
        let max_backoff = self.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF);
        let multiplier = self.multiplier.unwrap_or(DEFAULT_RETRY_MULTIPLIER);
        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let jitter = self.jitter.unwrap_or(DEFAULT_JITTER);

        if initial_backoff > max_backoff {
            return Err(ConfigError::new(
                "initial_backoff must not exceed max_backoff",
            ));
        }

        if !(multiplier >= 1.0) {
            return Err(ConfigError::new("multiplier must be at least 1.0"));
        }

        if !(0.0..1.0).contains(&jitter) {
            return Err(ConfigError::new("jitter must be in [0, 1)"));
        }

        Ok(RetryConfig {
            initial_backoff,
            max_backoff,
            multiplier,
            max_retries,
            jitter,
        })
    }
}

/// Credentials presented when a connection authenticates.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    username: Option<String>,
    password: Option<String>,
}

impl SecurityConfig {
    /// Returns the configured username.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the configured password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns true if username/password credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Builder for `SecurityConfig`.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfigBuilder {
    username: Option<String>,
    password: Option<String>,
}

impl SecurityConfigBuilder {
    /// Creates a new security configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password for authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets both username and password for authentication.
    pub fn credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username(username).password(password)
    }

    /// Builds the security configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if only one of `username` or `password` is set.
    pub fn build(self) -> Result<SecurityConfig, ConfigError> {
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::new(
                "both username and password must be provided together",
            ));
        }

        Ok(SecurityConfig {
            username: self.username,
            password: self.password,
        })
    }
}

/// Serialization settings.
#[derive(Debug, Clone)]
pub struct SerializationConfig {
    portable_version: i32,
    schema_fetch_timeout: Duration,
}

impl SerializationConfig {
    /// Returns the class version used by portables that do not declare one.
    pub fn portable_version(&self) -> i32 {
        self.portable_version
    }

    /// Returns the bound on a single class definition fetch.
    pub fn schema_fetch_timeout(&self) -> Duration {
        self.schema_fetch_timeout
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            portable_version: 0,
            schema_fetch_timeout: DEFAULT_SCHEMA_FETCH_TIMEOUT,
        }
    }
}

/// Builder for `SerializationConfig`.
#[derive(Debug, Clone, Default)]
pub struct SerializationConfigBuilder {
    portable_version: Option<i32>,
    schema_fetch_timeout: Option<Duration>,
}

impl SerializationConfigBuilder {
    /// Creates a new serialization configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default portable class version.
    pub fn portable_version(mut self, version: i32) -> Self {
        self.portable_version = Some(version);
        self
    }

    /// Sets the bound on a single class definition fetch.
    pub fn schema_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.schema_fetch_timeout = Some(timeout);
        self
    }

    /// Builds the serialization configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the portable version is negative or the fetch
    /// timeout is zero.
    pub fn build(self) -> Result<SerializationConfig, ConfigError> {
        let portable_version = self.portable_version.unwrap_or(0);
        let schema_fetch_timeout = self
            .schema_fetch_timeout
            .unwrap_or(DEFAULT_SCHEMA_FETCH_TIMEOUT);

        if portable_version < 0 {
            return Err(ConfigError::new("portable_version must not be negative"));
        }
        require_positive(schema_fetch_timeout, "schema_fetch_timeout")?;

        Ok(SerializationConfig {
            portable_version,
            schema_fetch_timeout,
        })
    }
}

/// Main client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    cluster_name: String,
    network: NetworkConfig,
    retry: RetryConfig,
    security: SecurityConfig,
    serialization: SerializationConfig,
    invocation_timeout: Duration,
    partition_refresh_interval: Duration,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the cluster name.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Returns the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Returns the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the security configuration.
    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    /// Returns the serialization configuration.
    pub fn serialization(&self) -> &SerializationConfig {
        &self.serialization
    }

    /// Returns the bound on one invocation, retries included.
    pub fn invocation_timeout(&self) -> Duration {
        self.invocation_timeout
    }

    /// Returns how often the partition table is refreshed.
    pub fn partition_refresh_interval(&self) -> Duration {
        self.partition_refresh_interval
    }

    /// Returns the `(username, password)` pair sent on authentication.
    ///
    /// Without explicit credentials the cluster name is the username.
    pub(crate) fn credentials(&self) -> (&str, &str) {
        (
            self.security.username().unwrap_or(&self.cluster_name),
            self.security.password().unwrap_or(DEFAULT_PASSWORD),
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            network: NetworkConfig::default(),
            retry: RetryConfig::default(),
            security: SecurityConfig::default(),
            serialization: SerializationConfig::default(),
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            partition_refresh_interval: DEFAULT_PARTITION_REFRESH_INTERVAL,
        }
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    cluster_name: Option<String>,
    network: NetworkConfigBuilder,
    retry: RetryConfigBuilder,
    security: SecurityConfigBuilder,
    serialization: SerializationConfigBuilder,
    invocation_timeout: Option<Duration>,
    partition_refresh_interval: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster name.
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Configures network settings using a builder function.
    pub fn network<F>(mut self, f: F) -> Self
    where
        F: FnOnce(NetworkConfigBuilder) -> NetworkConfigBuilder,
    {
        self.network = f(self.network);
        self
    }

    /// Configures retry settings using a builder function.
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        self.retry = f(self.retry);
        self
    }

    /// Configures security settings using a builder function.
    pub fn security<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SecurityConfigBuilder) -> SecurityConfigBuilder,
    {
        self.security = f(self.security);
        self
    }

    /// Configures serialization settings using a builder function.
    pub fn serialization<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SerializationConfigBuilder) -> SerializationConfigBuilder,
    {
        self.serialization = f(self.serialization);
        self
    }

    /// Adds a cluster member address.
    pub fn add_address(mut self, address: SocketAddr) -> Self {
        self.network = self.network.add_address(address);
        self
    }

    /// Sets the cluster member addresses.
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.network = self.network.addresses(addresses);
        self
    }

    /// Sets the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.network = self.network.connection_timeout(timeout);
        self
    }

    /// Sets credentials for authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.security = self.security.credentials(username, password);
        self
    }

    /// Sets the bound on one invocation, retries included.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Sets how often the partition table is refreshed.
    pub fn partition_refresh_interval(mut self, interval: Duration) -> Self {
        self.partition_refresh_interval = Some(interval);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let cluster_name = self
            .cluster_name
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());

        if cluster_name.is_empty() {
            return Err(ConfigError::new("cluster_name must not be empty"));
        }

        let invocation_timeout = self.invocation_timeout.unwrap_or(DEFAULT_INVOCATION_TIMEOUT);
        let partition_refresh_interval = self
            .partition_refresh_interval
            .unwrap_or(DEFAULT_PARTITION_REFRESH_INTERVAL);
        require_positive(invocation_timeout, "invocation_timeout")?;
        require_positive(partition_refresh_interval, "partition_refresh_interval")?;

        let network = self.network.build()?;
        let retry = self.retry.build()?;
        let security = self.security.build()?;
        let serialization = self.serialization.build()?;

        Ok(ClientConfig {
            cluster_name,
            network,
            retry,
            security,
            serialization,
            invocation_timeout,
            partition_refresh_interval,
        })
    }
}
