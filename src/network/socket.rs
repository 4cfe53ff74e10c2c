//! Synchronous socket acquisition.
//!
//! Sockets are bound on the caller's thread before any task runs, so a
//! client can send to the server as soon as `start` returns. They are
//! converted to tokio sockets later, inside whichever runtime serves them.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{Result, SetupError};

/// Bound sockets waiting to be handed to the task that serves them.
#[derive(Debug)]
pub struct ListeningSockets {
    udp: Option<(UdpSocket, SocketAddr)>,
    tcp: Option<(TcpListener, SocketAddr)>,
}

impl ListeningSockets {
    /// Bind every transport the configuration enables.
    ///
    /// On failure, anything bound so far is closed before the error returns.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = resolve(&config.address, config.port)?;

        let udp = if config.enable_udp {
            let socket = bind_udp(addr)?;
            let local = socket
                .local_addr()
                .map_err(|source| SetupError::BindUdp { addr, source })?;
            info!("UDP socket bound on {local}");
            Some((socket, local))
        } else {
            None
        };

        let tcp = if config.enable_tcp {
            let listener = bind_tcp(addr, config.tcp_backlog)?;
            let local = listener
                .local_addr()
                .map_err(|source| SetupError::BindTcp { addr, source })?;
            info!("TCP listener bound on {local}");
            Some((listener, local))
        } else {
            None
        };

        Ok(Self { udp, tcp })
    }

    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().map(|(_, addr)| *addr)
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().map(|(_, addr)| *addr)
    }

    /// Give up ownership of both sockets.
    pub fn into_parts(self) -> (Option<UdpSocket>, Option<TcpListener>) {
        (
            self.udp.map(|(socket, _)| socket),
            self.tcp.map(|(listener, _)| listener),
        )
    }
}

/// Resolve `address` and `port` to the first usable socket address.
pub fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (address, port)
        .to_socket_addrs()
        .map_err(|source| SetupError::Resolve {
            address: address.to_string(),
            port,
            source,
        })?;

    let addr = addrs.next().ok_or_else(|| SetupError::NoAddress {
        address: address.to_string(),
        port,
    })?;
    debug!("Resolved {address}:{port} to {addr}");
    Ok(addr)
}

/// Bind a non-blocking datagram socket.
pub fn bind_udp(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr).map_err(|source| SetupError::BindUdp { addr, source })?;
    socket
        .set_nonblocking(true)
        .map_err(|source| SetupError::BindUdp { addr, source })?;
    Ok(socket)
}

/// Bind a non-blocking listening socket with `SO_REUSEADDR`.
pub fn bind_tcp(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let bind_err = |source| SetupError::BindTcp { addr, source };

    let socket =
        Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn should_bind_both_transports_on_ephemeral_ports() {
        let sockets = ListeningSockets::bind(&ServerConfig::default()).unwrap();

        let udp = sockets.udp_addr().unwrap();
        let tcp = sockets.tcp_addr().unwrap();
        assert!(udp.ip().is_loopback());
        assert!(tcp.ip().is_loopback());
        assert_ne!(udp.port(), 0);
        assert_ne!(tcp.port(), 0);
    }

    #[test]
    fn should_skip_disabled_transports() {
        let sockets = ListeningSockets::bind(&ServerConfig::default().udp_only()).unwrap();
        assert!(sockets.udp_addr().is_some());
        assert!(sockets.tcp_addr().is_none());

        let (udp, tcp) = sockets.into_parts();
        assert!(udp.is_some());
        assert!(tcp.is_none());
    }

    #[test]
    fn should_accept_connections_once_bound() {
        let listener = bind_tcp("127.0.0.1:0".parse().unwrap(), 8).unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(std::net::TcpStream::connect(addr).is_ok());
    }

    #[test]
    fn should_fail_when_udp_port_is_taken() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig::default().udp_only().with_port(port);

        let result = ListeningSockets::bind(&config);

        assert!(matches!(
            result,
            Err(Error::Setup(SetupError::BindUdp { .. }))
        ));
    }

    #[test]
    fn should_release_udp_socket_when_tcp_bind_fails() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig::default().with_port(port);

        // UDP binds fine on this port, TCP is already listening there.
        let result = ListeningSockets::bind(&config);
        assert!(matches!(
            result,
            Err(Error::Setup(SetupError::BindTcp { .. }))
        ));

        // The UDP socket acquired first must have been closed again.
        assert!(UdpSocket::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn should_fail_to_resolve_garbage_host() {
        let result = resolve("definitely not a host name", 0);
        assert!(matches!(result, Err(Error::Setup(_))));
    }
}
