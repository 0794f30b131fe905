use chunkcheck_http::server::Server;
use curl::easy::Easy2;
use tracing::debug;

use crate::capture::CaptureSink;
use crate::drive::{DriveStrategy, Transfer, TransportError};
use crate::scenario::Scenario;

/// Blocks in libcurl until the transfer completes; the server runs on its own threads.
///
/// The easy handle keeps its own connection cache between performs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingDrive;

impl DriveStrategy for BlockingDrive {
    fn transfer(&self, server: &Server, mut easy: Easy2<CaptureSink>, scenario: &Scenario) -> Transfer {
        debug!(mode = %scenario.mode(), port = server.port(), "blocking perform");
        let outcome = easy.perform().map_err(|source| TransportError::Transfer { source });
        let sink = easy.get_mut().renew();
        Transfer { easy: Some(easy), sink, outcome }
    }
}
