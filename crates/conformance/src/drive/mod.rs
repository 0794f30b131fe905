//! Runs exchanges against a freshly started server.
//!
//! A [`Session`] starts the server in the scenario's threading mode and keeps
//! one libcurl easy handle capturing into a [`CaptureSink`]. Every
//! [`Session::fetch`] hands the handle to the [`DriveStrategy`] matching the
//! mode, so consecutive fetches can reuse the connection:
//!
//! - [`BlockingDrive`] for servers with threads of their own: a plain blocking perform
//! - [`MultiplexedDrive`] for externally driven servers: one wait over the client
//!   and server descriptors, alternating client and server progress

use curl::easy::{Easy2, HttpVersion, List};
use curl::{Error as CurlError, MultiError};
use std::fmt;
use std::time::Duration;

use chunkcheck_http::server::{ServeHandler, Server, ServerError};
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::{CaptureBuffer, CaptureSink, HeaderObservations};
use crate::scenario::{DriveMode, Scenario};

mod blocking;
mod multiplexed;

pub use blocking::BlockingDrive;
pub use multiplexed::MultiplexedDrive;

/// The scenario could not be set up; nothing was transferred.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("can't start the server: {source}")]
    Server {
        #[from]
        source: ServerError,
    },

    #[error("can't configure the client: {source}")]
    Client {
        #[from]
        source: CurlError,
    },
}

/// The transfer was started but did not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transfer failed: {source}")]
    Transfer { source: CurlError },

    #[error("multi handle failed: {source}")]
    Multi { source: MultiError },

    #[error("server readiness query failed: {source}")]
    Readiness { source: ServerError },

    #[error("server failed to make progress: {source}")]
    Progress { source: ServerError },

    #[error("transfer did not finish within {deadline:?}")]
    Deadline { deadline: Duration },
}

/// Why [`drive`] produced no [`Exchange`].
#[derive(Debug, Error)]
pub enum DriveError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("the server reported no usable port")]
    PortDiscovery,
}

/// The result of one transfer attempt.
#[derive(Debug)]
pub struct Transfer {
    /// The handle for the next transfer, `None` when it was lost.
    pub easy: Option<Easy2<CaptureSink>>,
    pub sink: CaptureSink,
    pub outcome: Result<(), TransportError>,
}

/// How the client and the server make progress during a transfer.
///
/// The strategy hands the easy handle back with a fresh sink in place, and keeps
/// whatever it needs for connection reuse between transfers.
pub trait DriveStrategy: fmt::Debug {
    fn transfer(&self, server: &Server, easy: Easy2<CaptureSink>, scenario: &Scenario) -> Transfer;
}

/// What the client observed in one exchange.
#[derive(Debug)]
pub struct Exchange {
    pub mode: DriveMode,
    pub port: u16,
    pub body: CaptureBuffer,
    pub headers: HeaderObservations,
    pub transport: Option<TransportError>,
    /// Connections libcurl opened for this exchange, when it could tell.
    pub new_connections: Option<u64>,
}

impl Exchange {
    pub fn is_transferred(&self) -> bool {
        self.transport.is_none()
    }
}

/// The strategy driving servers of `mode`.
pub fn strategy(mode: DriveMode) -> Box<dyn DriveStrategy> {
    match mode {
        DriveMode::External => Box::new(MultiplexedDrive::new()),
        DriveMode::InternalPolling | DriveMode::ThreadPerConnection | DriveMode::ThreadPool => Box::new(BlockingDrive),
    }
}

/// A running server and the client handle fetching from it.
#[derive(Debug)]
pub struct Session {
    scenario: Scenario,
    server: Server,
    port: u16,
    strategy: Box<dyn DriveStrategy>,
    easy: Option<Easy2<CaptureSink>>,
}

impl Session {
    /// Starts a server bound to `handler` and prepares the client.
    pub fn start<H: ServeHandler>(scenario: &Scenario, handler: H) -> Result<Self, DriveError> {
        let server = Server::builder()
            .port(0)
            .mode(scenario.threading())
            .error_log(scenario.error_log())
            .start(handler)
            .map_err(SetupError::from)?;

        let port = server.port();
        if port == 0 {
            return Err(DriveError::PortDiscovery);
        }
        debug!(mode = %scenario.mode(), port, "server started");

        let easy = configure_client(scenario, port).map_err(SetupError::from)?;
        Ok(Self { scenario: scenario.clone(), server, port, strategy: strategy(scenario.mode()), easy: Some(easy) })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Fetches the scenario's resource once.
    pub fn fetch(&mut self) -> Result<Exchange, DriveError> {
        let easy = match self.easy.take() {
            Some(easy) => easy,
            None => configure_client(&self.scenario, self.port).map_err(SetupError::from)?,
        };

        let Transfer { easy, sink, outcome } = self.strategy.transfer(&self.server, easy, &self.scenario);
        self.easy = easy;
        let new_connections = self.easy.as_mut().and_then(|easy| easy.num_connects().ok());

        let (body, headers) = sink.into_parts();
        let transport = outcome.err();
        let mode = self.scenario.mode();
        info!(%mode, port = self.port, received = body.len(), ok = transport.is_none(), ?new_connections, "exchange finished");
        Ok(Exchange { mode, port: self.port, body, headers, transport, new_connections })
    }

    /// Closes the client side, then stops the server.
    pub fn stop(self) {
        let Self { server, strategy, easy, .. } = self;
        drop(easy);
        drop(strategy);
        server.stop();
    }
}

/// Starts a server bound to `handler`, fetches the scenario's resource once and stops the server.
pub fn drive<H: ServeHandler>(scenario: &Scenario, handler: H) -> Result<Exchange, DriveError> {
    let mut session = Session::start(scenario, handler)?;
    let exchange = session.fetch();
    session.stop();
    exchange
}

fn configure_client(scenario: &Scenario, port: u16) -> Result<Easy2<CaptureSink>, CurlError> {
    let mut easy = Easy2::new(CaptureSink::new(scenario.capacity()));
    easy.url(&scenario.url())?;
    easy.port(port)?;
    easy.fail_on_error(true)?;
    easy.timeout(scenario.transfer_timeout())?;
    easy.connect_timeout(scenario.connect_timeout())?;
    easy.http_version(HttpVersion::V11)?;
    easy.signal(false)?;
    if scenario.conn_close() {
        let mut headers = List::new();
        headers.append("Connection: close")?;
        easy.http_headers(headers)?;
    }
    Ok(easy)
}
