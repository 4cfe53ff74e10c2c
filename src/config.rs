//! Server configuration loading and validation.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Where the server's concurrency scope runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingMode {
    /// A dedicated worker thread owns its own runtime.
    #[default]
    Threaded,
    /// The caller runs the server task inside its own runtime.
    Embedded,
}

/// Configuration for the fake DNS server.
///
/// Immutable once handed to [`crate::start`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind, either an IP literal or a resolvable host name.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port to bind. 0 lets the OS pick one per transport.
    #[serde(default)]
    pub port: u16,

    /// Serve DNS over UDP.
    #[serde(default = "default_enabled")]
    pub enable_udp: bool,

    /// Serve DNS over TCP.
    #[serde(default = "default_enabled")]
    pub enable_tcp: bool,

    #[serde(default)]
    pub hosting_mode: HostingMode,

    /// Pending connection queue length for the TCP listener.
    #[serde(default = "default_tcp_backlog")]
    pub tcp_backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: 0,
            enable_udp: default_enabled(),
            enable_tcp: default_enabled(),
            hosting_mode: HostingMode::default(),
            tcp_backlog: default_tcp_backlog(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_enabled() -> bool {
    true
}

const fn default_tcp_backlog() -> u32 {
    128
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::from(ValidationError::EmptyAddress).into());
        }

        if self.tcp_backlog == 0 {
            return Err(ConfigError::from(ValidationError::ZeroTcpBacklog).into());
        }

        Ok(())
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve UDP only.
    #[must_use]
    pub const fn udp_only(mut self) -> Self {
        self.enable_udp = true;
        self.enable_tcp = false;
        self
    }

    /// Serve TCP only.
    #[must_use]
    pub const fn tcp_only(mut self) -> Self {
        self.enable_udp = false;
        self.enable_tcp = true;
        self
    }

    #[must_use]
    pub const fn with_hosting_mode(mut self, mode: HostingMode) -> Self {
        self.hosting_mode = mode;
        self
    }

    #[must_use]
    pub const fn embedded(self) -> Self {
        self.with_hosting_mode(HostingMode::Embedded)
    }

    #[must_use]
    pub const fn with_tcp_backlog(mut self, backlog: u32) -> Self {
        self.tcp_backlog = backlog;
        self
    }
}
