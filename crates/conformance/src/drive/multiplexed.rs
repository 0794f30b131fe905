use std::time::{Duration, Instant};

use chunkcheck_http::server::{Server, ServerError};
use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Multi, WaitFd};
use tracing::{debug, trace, warn};

use crate::capture::CaptureSink;
use crate::drive::{DriveStrategy, Transfer, TransportError};
use crate::scenario::Scenario;

/// Longest a single wait blocks before both sides get another turn.
pub const WAIT_SLICE: Duration = Duration::from_millis(1);

/// Drives an externally driven server and a libcurl multi handle from the calling thread.
///
/// Every round performs the client, waits up to [`WAIT_SLICE`] for any client
/// or server descriptor, then lets the server run, until the transfer reports
/// a result or the scenario deadline passes. The multi handle owns the
/// connection cache, so it lives as long as the drive.
#[derive(Debug)]
pub struct MultiplexedDrive {
    multi: Multi,
}

impl MultiplexedDrive {
    pub fn new() -> Self {
        Self { multi: Multi::new() }
    }
}

impl Default for MultiplexedDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveStrategy for MultiplexedDrive {
    fn transfer(&self, server: &Server, easy: Easy2<CaptureSink>, scenario: &Scenario) -> Transfer {
        let mut handle = match self.multi.add2(easy) {
            Ok(handle) => handle,
            Err(source) => {
                return Transfer {
                    easy: None,
                    sink: CaptureSink::new(scenario.capacity()),
                    outcome: Err(TransportError::Multi { source }),
                };
            }
        };

        let outcome = pump(&self.multi, &handle, server, scenario.deadline());

        let sink = handle.get_mut().renew();
        let easy = match self.multi.remove2(handle) {
            Ok(easy) => Some(easy),
            Err(e) => {
                warn!(cause = %e, "can't detach the transfer from the multi handle");
                None
            }
        };
        Transfer { easy, sink, outcome }
    }
}

fn pump(multi: &Multi, handle: &Easy2Handle<CaptureSink>, server: &Server, budget: Duration) -> Result<(), TransportError> {
    let deadline = Instant::now() + budget;
    let mut rounds = 0u64;

    while Instant::now() < deadline {
        rounds += 1;
        let running = multi.perform().map_err(|source| TransportError::Multi { source })?;

        let mut result = None;
        multi.messages(|message| {
            if let Some(transfer) = message.result_for2(handle) {
                result = Some(transfer);
            }
        });
        if let Some(transfer) = result {
            debug!(rounds, "transfer finished");
            return transfer.map_err(|source| TransportError::Transfer { source });
        }

        let mut wait_fds = server_wait_fds(server).map_err(|source| TransportError::Readiness { source })?;
        trace!(running, server_fds = wait_fds.len(), "waiting");
        match multi.wait(&mut wait_fds, WAIT_SLICE) {
            Ok(_) => {}
            Err(e) if e.is_call_perform() => trace!("wait asked for another perform"),
            Err(source) => return Err(TransportError::Multi { source }),
        }

        server.run().map_err(|source| TransportError::Progress { source })?;
    }

    warn!(rounds, ?budget, "transfer deadline exceeded");
    Err(TransportError::Deadline { deadline: budget })
}

#[cfg(unix)]
fn server_wait_fds(server: &Server) -> Result<Vec<WaitFd>, ServerError> {
    let readiness = server.readiness()?;
    let mut wait_fds = Vec::with_capacity(readiness.read.len());
    for &fd in &readiness.read {
        let mut wait_fd = WaitFd::new();
        wait_fd.set_fd(fd);
        wait_fd.poll_on_read(true);
        wait_fd.poll_on_write(readiness.write.contains(&fd));
        wait_fds.push(wait_fd);
    }
    for &fd in readiness.write.iter().filter(|fd| !readiness.read.contains(fd)) {
        let mut wait_fd = WaitFd::new();
        wait_fd.set_fd(fd);
        wait_fd.poll_on_write(true);
        wait_fds.push(wait_fd);
    }
    Ok(wait_fds)
}

#[cfg(not(unix))]
fn server_wait_fds(_server: &Server) -> Result<Vec<WaitFd>, ServerError> {
    Err(ServerError::Unsupported)
}
