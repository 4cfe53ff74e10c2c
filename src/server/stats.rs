//! Counters describing what the server has seen.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for server operations, shared by every serving task.
#[derive(Debug, Default)]
pub struct ServerStats {
    udp_queries: AtomicU64,
    udp_errors: AtomicU64,
    tcp_connections: AtomicU64,
    tcp_queries: AtomicU64,
    tcp_errors: AtomicU64,
}

impl ServerStats {
    pub(crate) fn record_udp_query(&self) {
        self.udp_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_udp_error(&self) {
        self.udp_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tcp_connection(&self) {
        self.tcp_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tcp_query(&self) {
        self.tcp_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tcp_error(&self) {
        self.tcp_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            udp_queries: self.udp_queries.load(Ordering::Relaxed),
            udp_errors: self.udp_errors.load(Ordering::Relaxed),
            tcp_connections: self.tcp_connections.load(Ordering::Relaxed),
            tcp_queries: self.tcp_queries.load(Ordering::Relaxed),
            tcp_errors: self.tcp_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams received.
    pub udp_queries: u64,
    /// Datagrams dropped because they could not be answered.
    pub udp_errors: u64,
    /// Connections accepted.
    pub tcp_connections: u64,
    /// Complete frames read.
    pub tcp_queries: u64,
    /// Connections closed because of a failure.
    pub tcp_errors: u64,
}
