//! Checks an [`Exchange`] and aggregates scenario results.
//!
//! Every failure class owns one bit of a scenario's [`FailureSet`]. The run
//! code places each scenario's bits in its own byte, so codes of different
//! scenarios never alias:
//!
//! | reason                  | bit  |
//! |-------------------------|------|
//! | `Setup`                 | 1    |
//! | `PortDiscovery`         | 2    |
//! | `Transport`             | 4    |
//! | `CaptureOverflow`       | 8    |
//! | `LengthMismatch`        | 16   |
//! | `PatternMismatch`       | 32   |
//! | `MissingChunkedHeader`  | 64   |
//! | `MissingTrailer`        | 128  |

use std::fmt;
use std::thread;

use chunkcheck_http::server::ServeHandler;
use tracing::{error, info, warn};

use crate::adapter::RequestAdapter;
use crate::drive::{DriveError, Exchange, drive};
use crate::pattern::{BODY_LEN, CHUNK_SIZE, segment_byte};
use crate::scenario::{DriveMode, Scenario};

/// One class of scenario failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Setup,
    PortDiscovery,
    Transport,
    CaptureOverflow,
    LengthMismatch,
    PatternMismatch,
    MissingChunkedHeader,
    MissingTrailer,
}

impl FailureReason {
    pub const ALL: [FailureReason; 8] = [
        Self::Setup,
        Self::PortDiscovery,
        Self::Transport,
        Self::CaptureOverflow,
        Self::LengthMismatch,
        Self::PatternMismatch,
        Self::MissingChunkedHeader,
        Self::MissingTrailer,
    ];

    pub fn bit(self) -> u32 {
        match self {
            Self::Setup => 1,
            Self::PortDiscovery => 2,
            Self::Transport => 4,
            Self::CaptureOverflow => 8,
            Self::LengthMismatch => 16,
            Self::PatternMismatch => 32,
            Self::MissingChunkedHeader => 64,
            Self::MissingTrailer => 128,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Setup => "setup failed",
            Self::PortDiscovery => "port discovery failed",
            Self::Transport => "transport failed",
            Self::CaptureOverflow => "capture buffer overflow",
            Self::LengthMismatch => "body length mismatch",
            Self::PatternMismatch => "body pattern mismatch",
            Self::MissingChunkedHeader => "chunked header missing",
            Self::MissingTrailer => "trailer missing",
        };
        f.write_str(text)
    }
}

/// The failure reasons of one scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FailureSet(u32);

impl FailureSet {
    pub fn insert(&mut self, reason: FailureReason) {
        self.0 |= reason.bit();
    }

    pub fn contains(self, reason: FailureReason) -> bool {
        self.0 & reason.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = FailureReason> {
        FailureReason::ALL.into_iter().filter(move |reason| self.contains(*reason))
    }
}

impl From<FailureReason> for FailureSet {
    fn from(reason: FailureReason) -> Self {
        Self(reason.bit())
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    pub mode: DriveMode,
    pub conn_close: bool,
    pub failures: FailureSet,
    pub skipped: bool,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure bits shifted into this scenario's byte of the run code.
    pub fn code(&self) -> u32 {
        self.failures.bits() << (8 * self.mode.index())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    /// Aggregate code, zero when every scenario passed.
    pub fn code(&self) -> u32 {
        self.scenarios.iter().fold(0, |code, report| code | report.code())
    }
}

/// Checks a captured exchange: length, pattern, chunked header and trailer, in that order.
///
/// A transfer that did not complete is reported as an overflow when the capture
/// buffer refused data, otherwise as a transport failure; nothing else is checked then.
pub fn check_exchange(exchange: &Exchange) -> FailureSet {
    let mode = exchange.mode;
    let mut failures = FailureSet::default();

    if exchange.body.is_overflowed() {
        error!(%mode, capacity = exchange.body.capacity(), received = exchange.body.len(), "{}", FailureReason::CaptureOverflow);
        failures.insert(FailureReason::CaptureOverflow);
        return failures;
    }
    if let Some(cause) = &exchange.transport {
        error!(%mode, %cause, "{}", FailureReason::Transport);
        failures.insert(FailureReason::Transport);
        return failures;
    }

    let body = exchange.body.as_bytes();
    if body.len() == BODY_LEN {
        if let Some(offset) = first_pattern_mismatch(body) {
            error!(%mode, offset, found = body[offset], expected = segment_byte(offset / CHUNK_SIZE), "{}", FailureReason::PatternMismatch);
            failures.insert(FailureReason::PatternMismatch);
        }
    } else {
        error!(%mode, expected = BODY_LEN, received = body.len(), "{}", FailureReason::LengthMismatch);
        failures.insert(FailureReason::LengthMismatch);
    }

    if !exchange.headers.saw_chunked_marker() {
        error!(%mode, "{}", FailureReason::MissingChunkedHeader);
        failures.insert(FailureReason::MissingChunkedHeader);
    }
    if !exchange.headers.saw_trailer_marker() {
        error!(%mode, "{}", FailureReason::MissingTrailer);
        failures.insert(FailureReason::MissingTrailer);
    }

    failures
}

/// Offset of the first byte that differs from its segment's pattern.
fn first_pattern_mismatch(body: &[u8]) -> Option<usize> {
    body.chunks(CHUNK_SIZE).enumerate().find_map(|(segment, region)| {
        let expected = segment_byte(segment);
        region.iter().position(|&b| b != expected).map(|at| segment * CHUNK_SIZE + at)
    })
}

/// Drives `scenario` against `handler` and checks the exchange.
pub fn run_scenario_with<H: ServeHandler>(scenario: &Scenario, handler: H) -> ScenarioReport {
    let failures = match drive(scenario, handler) {
        Ok(exchange) => check_exchange(&exchange),
        Err(DriveError::Setup(cause)) => {
            error!(mode = %scenario.mode(), %cause, "{}", FailureReason::Setup);
            FailureReason::Setup.into()
        }
        Err(DriveError::PortDiscovery) => {
            error!(mode = %scenario.mode(), "{}", FailureReason::PortDiscovery);
            FailureReason::PortDiscovery.into()
        }
    };
    ScenarioReport { mode: scenario.mode(), conn_close: scenario.conn_close(), failures, skipped: false }
}

/// Drives `scenario` against the request adapter it configures.
pub fn run_scenario(scenario: &Scenario) -> ScenarioReport {
    run_scenario_with(scenario, RequestAdapter::new(scenario.assembler()))
}

/// Whether this process can start threads; the threaded scenarios are skipped otherwise.
pub fn threads_supported() -> bool {
    thread::Builder::new().name("chunkcheck-probe".to_owned()).spawn(|| ()).is_ok_and(|probe| probe.join().is_ok())
}

/// Runs every scenario in [`DriveMode::ALL`] order.
pub fn run_all(scenarios: &[Scenario]) -> RunReport {
    let threads = threads_supported();
    let mut report = RunReport::default();

    for scenario in scenarios {
        if scenario.mode().needs_threads() && !threads {
            warn!(mode = %scenario.mode(), "threads unavailable, scenario skipped");
            report.scenarios.push(ScenarioReport {
                mode: scenario.mode(),
                conn_close: scenario.conn_close(),
                failures: FailureSet::default(),
                skipped: true,
            });
            continue;
        }

        let scenario_report = run_scenario(scenario);
        if scenario_report.passed() {
            info!(mode = %scenario.mode(), conn_close = scenario.conn_close(), "scenario passed");
        } else {
            let reasons: Vec<_> = scenario_report.failures.iter().map(|reason| reason.to_string()).collect();
            error!(mode = %scenario.mode(), conn_close = scenario.conn_close(), code = scenario_report.code(), ?reasons, "scenario failed");
        }
        report.scenarios.push(scenario_report);
    }

    if report.passed() {
        info!(scenarios = report.scenarios.len(), "all scenarios passed");
    } else {
        error!(code = report.code(), "run failed");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureBuffer, HeaderObservations};
    use crate::drive::TransportError;
    use crate::pattern::expected_body;
    use std::time::Duration;

    fn exchange(body: &[u8], chunked: bool, trailer: bool) -> Exchange {
        let mut buffer = CaptureBuffer::default();
        assert!(buffer.write(body));
        let mut headers = HeaderObservations::default();
        if chunked {
            headers.observe(b"Transfer-Encoding: chunked\r\n");
        }
        if trailer {
            headers.observe(b"Footer: working\r\n");
        }
        Exchange { mode: DriveMode::InternalPolling, port: 8080, body: buffer, headers, transport: None, new_connections: Some(1) }
    }

    #[test]
    fn correct_exchange_passes() {
        assert!(check_exchange(&exchange(&expected_body(), true, true)).is_empty());
    }

    #[test]
    fn short_body_skips_pattern_check() {
        let failures = check_exchange(&exchange(&expected_body()[..1152], true, true));
        assert_eq!(failures, FailureReason::LengthMismatch.into());
    }

    #[test]
    fn corrupted_segment_is_a_pattern_mismatch() {
        let mut body = expected_body();
        body[5 * CHUNK_SIZE + 7] = b'Z';
        assert_eq!(first_pattern_mismatch(&body), Some(647));

        let failures = check_exchange(&exchange(&body, true, true));
        assert_eq!(failures, FailureReason::PatternMismatch.into());
    }

    #[test]
    fn missing_markers_add_their_own_reasons() {
        let failures = check_exchange(&exchange(&expected_body(), false, false));
        assert!(failures.contains(FailureReason::MissingChunkedHeader));
        assert!(failures.contains(FailureReason::MissingTrailer));
        assert_eq!(failures.bits(), 64 | 128);
    }

    #[test]
    fn overflow_is_not_a_transport_failure() {
        let mut buffer = CaptureBuffer::new(1000);
        assert!(buffer.write(&expected_body()[..896]));
        assert!(!buffer.write(&expected_body()[896..1024]));
        let exchange = Exchange {
            mode: DriveMode::External,
            port: 8080,
            body: buffer,
            headers: HeaderObservations::default(),
            transport: Some(TransportError::Deadline { deadline: Duration::from_secs(5) }),
            new_connections: None,
        };

        assert_eq!(check_exchange(&exchange), FailureReason::CaptureOverflow.into());
    }

    #[test]
    fn transport_failure_stops_the_checks() {
        let mut exchange = exchange(b"", false, false);
        exchange.transport = Some(TransportError::Deadline { deadline: Duration::from_secs(5) });
        assert_eq!(check_exchange(&exchange), FailureReason::Transport.into());
    }

    #[test]
    fn codes_never_alias_between_scenarios() {
        let mut seen = Vec::new();
        for mode in DriveMode::ALL {
            for reason in FailureReason::ALL {
                let report = ScenarioReport { mode, conn_close: false, failures: reason.into(), skipped: false };
                assert!(!seen.contains(&report.code()));
                seen.push(report.code());
            }
        }
        assert_eq!(seen.len(), 32);
    }

    #[test]
    fn run_code_aggregates() {
        let report = RunReport {
            scenarios: vec![
                ScenarioReport { mode: DriveMode::InternalPolling, conn_close: false, failures: FailureSet::default(), skipped: false },
                ScenarioReport { mode: DriveMode::ThreadPool, conn_close: false, failures: FailureReason::Transport.into(), skipped: false },
                ScenarioReport { mode: DriveMode::External, conn_close: false, failures: FailureReason::MissingTrailer.into(), skipped: false },
            ],
        };
        assert!(!report.passed());
        assert_eq!(report.code(), (4 << 16) | (128 << 24));
        assert!(RunReport::default().passed());
        assert_eq!(RunReport::default().code(), 0);
    }

    #[test]
    fn threads_are_available_in_tests() {
        assert!(threads_supported());
    }
}
