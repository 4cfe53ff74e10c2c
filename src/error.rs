//! Error types for the fake DNS server.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for server operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("DNS protocol error: {0}")]
    Protocol(#[from] hickory_proto::error::ProtoError),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("stream ended after {received} of {expected} bytes")]
    StreamTerminated { expected: usize, received: usize },

    #[error("frame payload of {0} bytes exceeds the 2-byte length prefix")]
    FrameTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while acquiring sockets and the worker runtime.
///
/// Any socket acquired before the failing step has already been released
/// by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to resolve {address}:{port}: {source}")]
    Resolve {
        address: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("no usable address for {address}:{port}")]
    NoAddress { address: String, port: u16 },

    #[error("failed to bind UDP socket on {addr}: {source}")]
    BindUdp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind TCP listener on {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to spawn worker thread: {0}")]
    Worker(#[source] io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("address cannot be empty")]
    EmptyAddress,

    #[error("tcp_backlog must be greater than 0")]
    ZeroTcpBacklog,
}

impl Error {
    /// Build a handler error from anything printable.
    pub fn handler(message: impl ToString) -> Self {
        Self::Handler(message.to_string())
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
