use std::net::{SocketAddr, TcpListener as StdTcpListener};
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::server::accept::{ConnectionContext, accept_loop, serve};
#[cfg(unix)]
use crate::server::external::{ConnectionRegistry, Readiness};
use crate::server::{ServeHandler, ServerBuilder, ServerError, ThreadingMode};

/// How many scheduler turns one [`Server::run`] call gives the connections.
#[cfg(unix)]
const RUN_TICKS: usize = 16;

type ThreadList = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// A started server.
///
/// Dropping it (or calling [`Server::stop`]) stops accepting, aborts open
/// connections, releases their in-flight responses and joins the server threads.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    mode: ThreadingMode,
    shutdown: CancellationToken,
    threads: Vec<JoinHandle<()>>,
    connection_threads: ThreadList,
    #[cfg(unix)]
    external: Option<ExternalDriver>,
    stopped: bool,
}

#[cfg(unix)]
#[derive(Debug)]
struct ExternalDriver {
    runtime: Runtime,
    registry: Arc<ConnectionRegistry>,
    listener_fd: RawFd,
}

impl ServerBuilder {
    /// Binds the listening socket and starts serving `handler` in the configured mode.
    pub fn start<H: ServeHandler>(self, handler: H) -> Result<Server, ServerError> {
        if let ThreadingMode::ThreadPool { size: 0 } = self.mode {
            return Err(ServerError::EmptyThreadPool);
        }

        let addr = self.socket_addr();
        let listener = StdTcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener.set_nonblocking(true).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind { addr, source })?;
        info!(%local_addr, mode = ?self.mode, "start listening");

        let handler = Arc::new(handler);
        let shutdown = CancellationToken::new();
        let context = ConnectionContext {
            error_log: self.error_log,
            shutdown: shutdown.clone(),
            #[cfg(unix)]
            registry: None,
        };

        let mut server = Server {
            local_addr,
            mode: self.mode,
            shutdown,
            threads: Vec::new(),
            connection_threads: ThreadList::default(),
            #[cfg(unix)]
            external: None,
            stopped: false,
        };

        match self.mode {
            ThreadingMode::InternalPolling => {
                server.threads.push(spawn_polling("chunkcheck-poll".to_owned(), listener, handler, context)?);
            }
            ThreadingMode::ThreadPool { size } => {
                for worker in 0..size {
                    let listener = listener.try_clone().map_err(ServerError::thread)?;
                    let thread = spawn_polling(format!("chunkcheck-worker-{worker}"), listener, Arc::clone(&handler), context.clone())?;
                    server.threads.push(thread);
                }
            }
            ThreadingMode::ThreadPerConnection => {
                let connection_threads = Arc::clone(&server.connection_threads);
                server.threads.push(spawn_acceptor(listener, handler, context, connection_threads)?);
            }
            #[cfg(unix)]
            ThreadingMode::External => {
                server.external = Some(ExternalDriver::start(listener, handler, context)?);
            }
            #[cfg(not(unix))]
            ThreadingMode::External => return Err(ServerError::Unsupported),
        }

        Ok(server)
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port, also when an ephemeral port was requested.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn mode(&self) -> ThreadingMode {
        self.mode
    }

    /// Descriptors an externally driven server is waiting on.
    #[cfg(unix)]
    pub fn readiness(&self) -> Result<Readiness, ServerError> {
        let driver = self.external.as_ref().ok_or(ServerError::NotExternal)?;
        Ok(driver.registry.readiness(driver.listener_fd))
    }

    /// Makes progress on an externally driven server without blocking on I/O:
    /// accepts pending connections, reads requests and writes what the sockets take.
    ///
    /// Must not be called from within an async runtime.
    pub fn run(&self) -> Result<(), ServerError> {
        #[cfg(unix)]
        if let Some(driver) = &self.external {
            driver.runtime.block_on(async {
                for _ in 0..RUN_TICKS {
                    tokio::task::yield_now().await;
                }
            });
            return Ok(());
        }
        Err(ServerError::NotExternal)
    }

    /// Stops the server, see the type level docs.
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.shutdown.cancel();

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                error!("server thread panicked");
            }
        }

        let connection_threads = std::mem::take(&mut *self.connection_threads.lock().unwrap_or_else(PoisonError::into_inner));
        for thread in connection_threads {
            if thread.join().is_err() {
                error!("connection thread panicked");
            }
        }

        #[cfg(unix)]
        if let Some(driver) = self.external.take() {
            driver.runtime.shutdown_background();
        }

        info!(local_addr = %self.local_addr, "server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

#[cfg(unix)]
impl ExternalDriver {
    fn start<H: ServeHandler>(listener: StdTcpListener, handler: Arc<H>, mut context: ConnectionContext) -> Result<Self, ServerError> {
        let runtime = build_runtime()?;
        let registry = Arc::new(ConnectionRegistry::default());
        context.registry = Some(Arc::clone(&registry));

        let listener_fd = listener.as_raw_fd();
        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(listener).map_err(ServerError::runtime)?
        };

        let shutdown = context.shutdown.clone();
        runtime.spawn(async move {
            accept_loop(listener, shutdown, |tcp_stream, remote_addr| {
                tokio::spawn(serve(tcp_stream, remote_addr, Arc::clone(&handler), context.clone()));
            })
            .await;
        });

        Ok(Self { runtime, registry, listener_fd })
    }
}

fn build_runtime() -> Result<Runtime, ServerError> {
    Builder::new_current_thread().enable_all().build().map_err(ServerError::runtime)
}

/// One thread polling the listener and all its connections.
fn spawn_polling<H: ServeHandler>(
    name: String,
    listener: StdTcpListener,
    handler: Arc<H>,
    context: ConnectionContext,
) -> Result<JoinHandle<()>, ServerError> {
    let runtime = build_runtime()?;
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(cause = %e, "can't register listener");
                        return;
                    }
                };

                let shutdown = context.shutdown.clone();
                accept_loop(listener, shutdown, |tcp_stream, remote_addr| {
                    tokio::spawn(serve(tcp_stream, remote_addr, Arc::clone(&handler), context.clone()));
                })
                .await;
            });
        })
        .map_err(ServerError::thread)
}

/// One thread accepting, each connection served on a thread of its own.
fn spawn_acceptor<H: ServeHandler>(
    listener: StdTcpListener,
    handler: Arc<H>,
    context: ConnectionContext,
    connection_threads: ThreadList,
) -> Result<JoinHandle<()>, ServerError> {
    let runtime = build_runtime()?;
    thread::Builder::new()
        .name("chunkcheck-accept".to_owned())
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(cause = %e, "can't register listener");
                        return;
                    }
                };

                let shutdown = context.shutdown.clone();
                accept_loop(listener, shutdown, |tcp_stream, remote_addr| {
                    match spawn_connection_thread(tcp_stream, remote_addr, Arc::clone(&handler), context.clone()) {
                        Ok(thread) => {
                            let mut threads = connection_threads.lock().unwrap_or_else(PoisonError::into_inner);
                            threads.retain(|thread| !thread.is_finished());
                            threads.push(thread);
                        }
                        Err(e) => error!(%remote_addr, cause = %e, "can't serve connection"),
                    }
                })
                .await;
            });
        })
        .map_err(ServerError::thread)
}

fn spawn_connection_thread<H: ServeHandler>(
    tcp_stream: TcpStream,
    remote_addr: SocketAddr,
    handler: Arc<H>,
    context: ConnectionContext,
) -> Result<JoinHandle<()>, ServerError> {
    let std_stream = tcp_stream.into_std().map_err(ServerError::thread)?;
    let runtime = build_runtime()?;
    thread::Builder::new()
        .name(format!("chunkcheck-conn-{}", remote_addr.port()))
        .spawn(move || {
            runtime.block_on(async move {
                match TcpStream::from_std(std_stream) {
                    Ok(tcp_stream) => serve(tcp_stream, remote_addr, handler, context).await,
                    Err(e) => warn!(%remote_addr, cause = %e, "can't register connection"),
                }
            });
        })
        .map_err(ServerError::thread)
}
