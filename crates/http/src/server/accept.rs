use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::server::ServeHandler;
#[cfg(unix)]
use crate::server::external::ConnectionRegistry;

/// What every connection of one server shares.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) error_log: bool,
    pub(crate) shutdown: CancellationToken,
    #[cfg(unix)]
    pub(crate) registry: Option<Arc<ConnectionRegistry>>,
}

/// Accepts connections until the server stops, handing each to `on_accept`.
pub(crate) async fn accept_loop<F>(listener: TcpListener, shutdown: CancellationToken, mut on_accept: F)
where
    F: FnMut(TcpStream, SocketAddr),
{
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => {
                debug!("server stopped, leave accept loop");
                return;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((tcp_stream, remote_addr)) => on_accept(tcp_stream, remote_addr),
            Err(e) => warn!(cause = %e, "failed to accept"),
        }
    }
}

/// Runs one connection to completion or until the server stops.
///
/// Stopping drops the in-flight response, which releases its content reader.
pub(crate) async fn serve<H: ServeHandler>(tcp_stream: TcpStream, remote_addr: SocketAddr, handler: Arc<H>, context: ConnectionContext) {
    #[cfg(unix)]
    let registration = context.registry.as_ref().map(|registry| registry.register(&tcp_stream));

    let (reader, writer) = tcp_stream.into_split();
    let mut connection = HttpConnection::new(reader, writer);
    #[cfg(unix)]
    if let Some(registration) = &registration {
        connection = connection.with_sending_flag(registration.sending_flag());
    }

    let id = connection.id();
    debug!(connection = %id, %remote_addr, "accepted connection");

    tokio::select! {
        result = connection.process(handler) => match result {
            Ok(()) => info!(connection = %id, "finished process, connection shutdown"),
            Err(e) if context.error_log => error!(connection = %id, cause = %e, "service has error, connection shutdown"),
            Err(e) => debug!(connection = %id, cause = %e, "service has error, connection shutdown"),
        },
        () = context.shutdown.cancelled() => debug!(connection = %id, "server stopped, connection aborted"),
    }
}
