//! DNS over TCP: 2-byte length framing, one task per connection.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, instrument, trace, warn};

use super::scope::{CancelToken, Scope};
use super::stats::ServerStats;
use crate::dns::{Handler, respond};
use crate::error::Result;
use crate::network::{read_frame, write_frame};

/// Pause after a failed accept, so a persistent error cannot spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept connections on `listener` until `token` is cancelled.
///
/// Each connection is served by its own task in a child scope. When this
/// loop is cancelled, every live connection is cancelled and joined before
/// it returns.
pub async fn serve_tcp<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
    mut token: CancelToken,
) {
    let mut connections = Scope::new("tcp-connections");

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    stats.record_tcp_connection();
                    connections.reap();
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&handler),
                        Arc::clone(&stats),
                        connections.token(),
                    ));
                }
                Err(err) => {
                    warn!("TCP accept error: {err}");
                    if backoff(&mut token).await.is_break() {
                        break;
                    }
                }
            },
        }
    }

    debug!(live = connections.len(), "TCP listener stopping");
    connections.close().await;
}

/// Wait out [`ACCEPT_BACKOFF`], giving up early if `token` fires.
async fn backoff(token: &mut CancelToken) -> ControlFlow<()> {
    tokio::select! {
        biased;
        () = token.cancelled() => ControlFlow::Break(()),
        () = tokio::time::sleep(ACCEPT_BACKOFF) => ControlFlow::Continue(()),
    }
}

/// Serve framed queries on one connection until the peer leaves, a step
/// fails or `token` is cancelled. Failures end this connection only.
#[instrument(skip_all, fields(peer = %peer))]
async fn serve_connection<H: Handler>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
    mut token: CancelToken,
) {
    trace!("Connection accepted");

    loop {
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            outcome = exchange(&mut stream, handler.as_ref(), &stats) => outcome,
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => {
                trace!("Peer closed connection");
                break;
            }
            Err(err) => {
                debug!("Closing connection: {err}");
                stats.record_tcp_error();
                break;
            }
        }
    }
}

/// Read one frame, answer it, write the answer. `Ok(false)` means the peer
/// closed the stream between frames.
async fn exchange<H: Handler>(
    stream: &mut TcpStream,
    handler: &H,
    stats: &ServerStats,
) -> Result<bool> {
    let Some(request) = read_frame(stream).await? else {
        return Ok(false);
    };
    stats.record_tcp_query();

    let response = respond(handler, &request).await?;
    write_frame(stream, &response).await?;
    Ok(true)
}
