use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// How the server schedules its listener and connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadingMode {
    /// One internal thread polls the listener and every connection.
    #[default]
    InternalPolling,
    /// One acceptor thread, one thread per accepted connection.
    ThreadPerConnection,
    /// `size` worker threads share the listening socket.
    ThreadPool { size: usize },
    /// No server threads; the owner polls [`Server::readiness`](super::Server::readiness)
    /// and calls [`Server::run`](super::Server::run) to make progress.
    External,
}

impl ThreadingMode {
    pub fn spawns_threads(&self) -> bool {
        !matches!(self, ThreadingMode::External)
    }
}

/// Builder for a [`Server`](super::Server).
///
/// ```no_run
/// use chunkcheck_http::server::{ServerBuilder, ThreadingMode};
///
/// let builder = ServerBuilder::new().port(0).mode(ThreadingMode::ThreadPool { size: 2 }).error_log(true);
/// ```
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    pub(crate) bind_address: IpAddr,
    pub(crate) port: u16,
    pub(crate) mode: ThreadingMode,
    pub(crate) error_log: bool,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self { bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 0, mode: ThreadingMode::default(), error_log: false }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port to listen on; 0 picks an ephemeral port, see [`Server::port`](super::Server::port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn mode(mut self, mode: ThreadingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Log failed connections at `error` level instead of `debug`.
    pub fn error_log(mut self, enabled: bool) -> Self {
        self.error_log = enabled;
        self
    }

    pub(crate) fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
