//! Configuration for the batch engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default NETCONF-over-SSH port.
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// Connection parameters handed to a transport implementation.
///
/// The engine never dials on its own; callers build their transport from
/// these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device address.
    pub host: String,
    /// Device port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Password, used when no key is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Private key file. Takes priority over the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_NETCONF_PORT
}

/// How a transport should authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// Public key authentication with the key at this path.
    KeyFile(&'a std::path::Path),
    /// Password authentication.
    Password(&'a str),
}

/// Device configuration problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a key nor a password was configured.
    #[error("no credentials configured for {username}@{host}")]
    MissingCredentials {
        /// Login name.
        username: String,
        /// Device address.
        host: String,
    },

    /// The host is empty.
    #[error("device host is empty")]
    EmptyHost,
}

impl DeviceConfig {
    /// Creates a device configuration on the default port.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_NETCONF_PORT,
            username: username.into(),
            password: None,
            ssh_key: None,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the private key file.
    pub fn with_ssh_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh_key = Some(path.into());
        self
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves the credentials a transport should use. A configured key
    /// wins over a password.
    pub fn credentials(&self) -> Result<Credentials<'_>, ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        match (&self.ssh_key, &self.password) {
            (Some(key), _) => Ok(Credentials::KeyFile(key)),
            (None, Some(password)) => Ok(Credentials::Password(password)),
            (None, None) => Err(ConfigError::MissingCredentials {
                username: self.username.clone(),
                host: self.host.clone(),
            }),
        }
    }
}

/// Configuration for a batch coordinator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Clear the pending writes and deletes after a successful commit.
    pub reset_after_commit: bool,
}

impl BatchConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            reset_after_commit: true,
        }
    }

    /// Sets whether pending state is cleared after a successful commit.
    ///
    /// With this disabled, every later commit resends everything staged
    /// since the coordinator was created, and the read cache is not updated
    /// from committed batches.
    pub fn with_reset_after_commit(mut self, reset: bool) -> Self {
        self.reset_after_commit = reset;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new()
    }
}
