//! Connection parameters and session tuning.

use std::path::Path;
use std::time::Duration;

use crate::error::{PluginError, Result};
use crate::protocol::DEFAULT_CHAT_DOMAIN;

/// Default number of attempts when resolving the local summoner.
const DEFAULT_IDENTITY_RETRY_ATTEMPTS: u32 = 20;

/// Default pause between two identity attempts.
const DEFAULT_IDENTITY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Username the League client expects for basic auth.
const LCU_USERNAME: &str = "riot";

// ── Connection ──────────────────────────────────────────────────────

/// Where the League client listens and how to authenticate against it.
///
/// # Example
///
/// ```
/// use reject_party_owner::ConnectionConfig;
///
/// let config = ConnectionConfig::from_lockfile("LeagueClient:1234:50123:s3cret:https").unwrap();
/// assert_eq!(config.base_url(), "https://127.0.0.1:50123");
/// assert_eq!(config.websocket_url(), "wss://127.0.0.1:50123/");
/// assert_eq!(config.username, "riot");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `https` for a real client, `http` for local test doubles.
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn new(
        protocol: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the `name:pid:port:password:protocol` lockfile the client writes
    /// into its install directory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidConfig`] if a field is missing or the port
    /// is not a number.
    pub fn from_lockfile(contents: &str) -> Result<Self> {
        let mut fields = contents.trim().split(':');
        let mut next = |what: &str| {
            fields
                .next()
                .filter(|field| !field.is_empty())
                .ok_or_else(|| PluginError::InvalidConfig(format!("lockfile is missing {what}")))
        };

        let _name = next("process name")?;
        let _pid = next("pid")?;
        let raw_port = next("port")?;
        let password = next("password")?;
        let protocol = next("protocol")?;

        let port = raw_port
            .parse::<u16>()
            .map_err(|e| PluginError::InvalidConfig(format!("invalid port {raw_port:?}: {e}")))?;

        Ok(Self::new(protocol, "127.0.0.1", port, LCU_USERNAME, password))
    }

    /// Read and parse a lockfile from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the file cannot be read, or any error of
    /// [`from_lockfile`](Self::from_lockfile).
    pub fn from_lockfile_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_lockfile(&contents)
    }

    /// Base URL for REST calls, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.address, self.port)
    }

    /// URL of the websocket event feed.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.protocol.eq_ignore_ascii_case("https") {
            "wss"
        } else {
            "ws"
        };
        format!("{scheme}://{}:{}/", self.address, self.port)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Session tuning ──────────────────────────────────────────────────

/// Tuning knobs for a [`PartyOwnerClient`](crate::client::PartyOwnerClient) session.
///
/// # Example
///
/// ```
/// use reject_party_owner::PluginConfig;
/// use std::time::Duration;
///
/// let config = PluginConfig::default()
///     .with_identity_retry_attempts(5)
///     .with_identity_retry_delay(Duration::from_millis(200))
///     .with_chat_domain("sec.euw1.pvp.net");
/// assert_eq!(config.identity_retry_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// How many times the local summoner lookup is attempted before bootstrap
    /// gives up. Defaults to **20**. Values below 1 are clamped to 1.
    pub identity_retry_attempts: u32,
    /// Pause between two identity attempts. Defaults to **1 second**.
    pub identity_retry_delay: Duration,
    /// Chat server domain used to address the party conversation.
    /// Defaults to `sec.na1.pvp.net`.
    pub chat_domain: String,
    /// Capacity of the bounded [`PluginEvent`](crate::PluginEvent) channel.
    ///
    /// Events are dropped (with a warning logged) when the consumer lags.
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`shutdown`](crate::client::PartyOwnerClient::shutdown) waits
    /// for the dispatch loop before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            identity_retry_attempts: DEFAULT_IDENTITY_RETRY_ATTEMPTS,
            identity_retry_delay: DEFAULT_IDENTITY_RETRY_DELAY,
            chat_domain: DEFAULT_CHAT_DOMAIN.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PluginConfig {
    #[must_use]
    pub fn with_identity_retry_attempts(mut self, attempts: u32) -> Self {
        self.identity_retry_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_identity_retry_delay(mut self, delay: Duration) -> Self {
        self.identity_retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_chat_domain(mut self, domain: impl Into<String>) -> Self {
        self.chat_domain = domain.into();
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}
