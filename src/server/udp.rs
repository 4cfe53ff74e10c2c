//! DNS over UDP: one message per datagram, served one at a time.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::scope::CancelToken;
use super::stats::ServerStats;
use crate::dns::{Handler, MAX_MESSAGE_SIZE, respond};
use crate::error::Error;

/// Answer datagrams on `socket` until `token` is cancelled.
///
/// A datagram that cannot be decoded, dispatched, encoded or sent is
/// dropped and the loop moves on to the next one.
pub async fn serve_udp<H: Handler>(
    socket: UdpSocket,
    handler: Arc<H>,
    stats: Arc<ServerStats>,
    mut token: CancelToken,
) {
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = serve_datagram(&socket, &handler, &stats, &mut buf) => {}
        }
    }

    debug!("UDP loop stopped");
}

async fn serve_datagram<H: Handler>(
    socket: &UdpSocket,
    handler: &Arc<H>,
    stats: &ServerStats,
    buf: &mut [u8],
) {
    let (len, peer) = match socket.recv_from(buf).await {
        Ok(received) => received,
        Err(err) => {
            debug!("UDP receive error: {err}");
            stats.record_udp_error();
            tokio::task::yield_now().await;
            return;
        }
    };

    stats.record_udp_query();
    trace!("UDP received {len} bytes from {peer}");

    if let Err(err) = answer(socket, handler, buf[..len].to_vec(), peer).await {
        debug!("Dropping UDP datagram from {peer}: {err}");
        stats.record_udp_error();
    }
}

async fn answer<H: Handler>(
    socket: &UdpSocket,
    handler: &Arc<H>,
    wire: Vec<u8>,
    peer: SocketAddr,
) -> crate::Result<()> {
    let response = dispatch(Arc::clone(handler), wire).await?;
    socket.send_to(&response, peer).await?;
    Ok(())
}

/// Run the handler on its own task. A panic there drops this datagram only.
/// Dropping the returned future aborts the task.
async fn dispatch<H: Handler>(handler: Arc<H>, wire: Vec<u8>) -> crate::Result<Vec<u8>> {
    let mut task = JoinSet::new();
    task.spawn(async move { respond(handler.as_ref(), &wire).await });

    match task.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(err)) => Err(Error::handler(format!("handler task failed: {err}"))),
        None => Err(Error::handler("handler task vanished")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::codec::tests::create_query;
    use crate::dns::{Refuser, Response, decode, encode, handler_fn, refused_response};
    use crate::server::scope::Scope;
    use hickory_proto::op::ResponseCode;
    use hickory_proto::rr::RecordType;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn start_loop() -> (Scope, SocketAddr, Arc<ServerStats>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let stats = Arc::new(ServerStats::default());

        let mut scope = Scope::new("udp-test");
        let token = scope.token();
        scope.spawn(serve_udp(socket, Arc::new(Refuser), Arc::clone(&stats), token));
        (scope, addr, stats)
    }

    async fn exchange(client: &UdpSocket, server: SocketAddr, wire: &[u8]) -> Vec<u8> {
        client.send_to(wire, server).await.unwrap();
        let mut buf = [0u8; 512];
        let (n, _) = timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn should_answer_query_with_refused() {
        let (scope, server, stats) = start_loop().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let query = create_query("example.com.", RecordType::A, 5678);

        let response = decode(&exchange(&client, server, &encode(&query).unwrap()).await).unwrap();

        assert_eq!(response.id(), 5678);
        assert_eq!(response.response_code(), ResponseCode::Refused);
        assert_eq!(response.queries(), query.queries());
        assert_eq!(stats.snapshot().udp_queries, 1);
        scope.close().await;
    }

    #[tokio::test]
    async fn should_keep_serving_after_garbage_datagram() {
        let (scope, server, stats) = start_loop().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(&[0xff, 0x00, 0x13], server).await.unwrap();
        let query = create_query("example.com.", RecordType::A, 11);
        let response = decode(&exchange(&client, server, &encode(&query).unwrap()).await).unwrap();

        assert_eq!(response.id(), 11);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.udp_queries, 2);
        assert_eq!(snapshot.udp_errors, 1);
        scope.close().await;
    }

    #[tokio::test]
    async fn should_drop_only_the_datagram_whose_handler_panicked() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = socket.local_addr().unwrap();
        let stats = Arc::new(ServerStats::default());
        let handler = handler_fn(|request: hickory_proto::op::Message| async move {
            if request.queries()[0].name().to_utf8() == "boom.example." {
                panic!("handler failure");
            }
            Ok::<_, Error>(Response::Message(refused_response(&request)))
        });

        let mut scope = Scope::new("udp-test");
        let token = scope.token();
        scope.spawn(serve_udp(socket, Arc::new(handler), Arc::clone(&stats), token));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let boom = create_query("boom.example.", RecordType::A, 1);
        client.send_to(&encode(&boom).unwrap(), server).await.unwrap();

        let query = create_query("ok.example.", RecordType::A, 2);
        let response = decode(&exchange(&client, server, &encode(&query).unwrap()).await).unwrap();

        assert_eq!(response.id(), 2);
        assert_eq!(response.response_code(), ResponseCode::Refused);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.udp_queries, 2);
        assert_eq!(snapshot.udp_errors, 1);
        assert_eq!(scope.len(), 1);
        scope.close().await;
    }

    #[tokio::test]
    async fn should_stop_when_cancelled() {
        let (scope, _, _) = start_loop().await;
        timeout(Duration::from_secs(5), scope.close()).await.unwrap();
    }
}
