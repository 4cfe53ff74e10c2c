//! Server orchestration.
//!
//! [`ServeTask::run`] is the single entry point for serving: it opens one
//! [`Scope`] holding the shutdown listener, the UDP loop and the TCP
//! listener as siblings. Whichever sibling exits first (normally the
//! shutdown listener) cancels the others, and `run` returns only after all
//! of them have unwound. Both hosting modes call it unchanged.

pub mod scope;
pub mod shutdown;
pub mod stats;
pub mod tcp;
pub mod udp;

use std::sync::Arc;

use tracing::info;

use crate::dns::Handler;
use crate::error::Result;
use crate::network::ListeningSockets;

pub use scope::{CancelToken, Scope};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use stats::{ServerStats, StatsSnapshot};

/// Everything a running server needs, owned by value.
///
/// Created by [`crate::Server::start`]. In threaded mode the worker runs it;
/// in embedded mode the caller takes it and awaits [`ServeTask::run`] from
/// its own runtime.
pub struct ServeTask<H> {
    sockets: ListeningSockets,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
    signal: ShutdownSignal,
}

impl<H: Handler> ServeTask<H> {
    pub(crate) const fn new(
        sockets: ListeningSockets,
        handler: Arc<H>,
        stats: Arc<ServerStats>,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            sockets,
            handler,
            stats,
            signal,
        }
    }

    /// Serve until shutdown is requested.
    ///
    /// Must be polled from within a tokio runtime with I/O enabled. Dropping
    /// the returned future before completion aborts every serving task.
    pub async fn run(self) -> Result<()> {
        let Self {
            sockets,
            handler,
            stats,
            signal,
        } = self;

        let (udp, tcp) = sockets.into_parts();
        let udp = udp.map(tokio::net::UdpSocket::from_std).transpose()?;
        let tcp = tcp.map(tokio::net::TcpListener::from_std).transpose()?;

        let mut scope = Scope::new("server");

        let token = scope.token();
        scope.spawn(listen_for_shutdown(signal, token));

        if let Some(socket) = udp {
            let token = scope.token();
            scope.spawn(udp::serve_udp(
                socket,
                Arc::clone(&handler),
                Arc::clone(&stats),
                token,
            ));
        }

        if let Some(listener) = tcp {
            let token = scope.token();
            scope.spawn(tcp::serve_tcp(
                listener,
                Arc::clone(&handler),
                Arc::clone(&stats),
                token,
            ));
        }

        info!("DNS server running");
        scope.join_first().await;
        info!("DNS server stopped");
        Ok(())
    }
}

async fn listen_for_shutdown(signal: ShutdownSignal, mut token: CancelToken) {
    tokio::select! {
        () = signal.wait() => info!("Shutdown requested"),
        () = token.cancelled() => {}
    }
}
