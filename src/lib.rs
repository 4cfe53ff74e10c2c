//! Nanoserver - A minimal embeddable fake DNS server for tests.
//!
//! The server answers DNS queries over UDP and TCP by handing each decoded
//! request to a pluggable [`Handler`]. The default handler refuses
//! everything. A handler may also answer with raw bytes to exercise clients
//! against malformed responses.
//!
//! # Architecture
//!
//! - [`config`]: Server configuration and TOML loading
//! - [`dns`]: Message codec helpers and the handler hook
//! - [`network`]: Socket binding, exact reads and TCP framing
//! - [`server`]: The serving scope, UDP loop and TCP listener
//! - [`lifecycle`]: Starting, hosting and stopping a server
//! - [`error`]: Error types
//!
//! # Hosting
//!
//! In threaded mode the server owns a worker thread:
//!
//! ```no_run
//! use nanoserver::ServerConfig;
//!
//! let server = nanoserver::start(ServerConfig::default())?;
//! let udp = server.udp_addr();
//! // ... send queries to `udp` ...
//! server.stop();
//! # Ok::<(), nanoserver::Error>(())
//! ```
//!
//! In embedded mode the caller runs the serving task in its own runtime:
//!
//! ```no_run
//! use nanoserver::ServerConfig;
//!
//! # async fn example() -> nanoserver::Result<()> {
//! let server = nanoserver::start(ServerConfig::default().embedded())?;
//! let task = server.take_task().expect("embedded servers park their task");
//! let serving = tokio::spawn(task.run());
//! // ... send queries ...
//! server.stop();
//! serving.await.expect("serving task panicked")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod server;

pub use config::{HostingMode, ServerConfig};
pub use dns::{Handler, Refuser, Response, handler_fn};
pub use error::{Error, Result};
pub use lifecycle::{RunningServer, Server, start};
pub use server::{ServeTask, StatsSnapshot};
