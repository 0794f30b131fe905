use std::convert::Infallible;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use chunkcheck::adapter::RequestAdapter;
use chunkcheck::drive::{Exchange, Session, TransportError, drive};
use chunkcheck::pattern::{BODY_LEN, expected_body};
use chunkcheck::scenario::{DriveMode, Scenario};
use chunkcheck::verify::{FailureReason, check_exchange, run_scenario, run_scenario_with};
use chunkcheck_http::handler::{Handler, Invocation, Reply};
use chunkcheck_http::protocol::body::{ContentReader, ReadStatus, ReaderBody};
use chunkcheck_http::protocol::{ContentError, Footers};
use http::Response;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

fn exchange(scenario: &Scenario) -> Exchange {
    drive(scenario, RequestAdapter::new(scenario.assembler())).unwrap()
}

fn assert_conformant(exchange: &Exchange) {
    assert!(exchange.transport.is_none(), "{:?}", exchange.transport);
    assert_ne!(exchange.port, 0);
    assert_eq!(exchange.body.len(), BODY_LEN);
    assert_eq!(exchange.body.as_bytes(), &expected_body()[..]);
    assert_eq!(exchange.headers.chunked_lines(), 1);
    assert_eq!(exchange.headers.trailer_lines(), 1);
    assert!(check_exchange(exchange).is_empty());
}

#[test]
fn every_mode_keep_alive() {
    init_logging();
    for mode in DriveMode::ALL {
        let exchange = exchange(&Scenario::new(mode));
        assert_eq!(exchange.mode, mode);
        assert_conformant(&exchange);
    }
}

#[test]
fn every_mode_connection_close() {
    init_logging();
    for mode in DriveMode::ALL {
        let exchange = exchange(&Scenario::new(mode).with_conn_close(true));
        assert_conformant(&exchange);
    }
}

#[test]
fn keep_alive_connection_is_reused_after_the_footer() {
    init_logging();
    for mode in DriveMode::ALL {
        let scenario = Scenario::new(mode);
        let mut session = Session::start(&scenario, RequestAdapter::new(scenario.assembler())).unwrap();

        let first = session.fetch().unwrap();
        let second = session.fetch().unwrap();
        session.stop();

        assert_conformant(&first);
        assert_conformant(&second);
        assert_eq!(first.new_connections, Some(1), "{mode}");
        assert_eq!(second.new_connections, Some(0), "{mode}");
    }
}

#[test]
fn connection_close_opens_a_connection_per_fetch() {
    init_logging();
    for mode in DriveMode::ALL {
        let scenario = Scenario::new(mode).with_conn_close(true);
        let mut session = Session::start(&scenario, RequestAdapter::new(scenario.assembler())).unwrap();

        for _ in 0..2 {
            let exchange = session.fetch().unwrap();
            assert_conformant(&exchange);
            assert_eq!(exchange.new_connections, Some(1), "{mode}");
        }
        session.stop();
    }
}

#[test]
fn reports_pass_in_every_mode() {
    init_logging();
    for mode in DriveMode::ALL {
        for conn_close in [false, true] {
            let report = run_scenario(&Scenario::new(mode).with_conn_close(conn_close));
            assert!(report.passed(), "{mode} conn_close={conn_close}: {:?}", report.failures);
            assert_eq!(report.code(), 0);
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    init_logging();
    let scenario = Scenario::new(DriveMode::External);
    let first = exchange(&scenario);
    for _ in 0..3 {
        let next = exchange(&scenario);
        assert_eq!(next.body, first.body);
        assert_eq!(next.headers, first.headers);
    }
}

#[test]
fn small_capture_buffer_overflows() {
    init_logging();
    for mode in [DriveMode::InternalPolling, DriveMode::External] {
        let scenario = Scenario::new(mode).with_capacity(1000);
        let exchange = exchange(&scenario);
        assert!(exchange.body.is_overflowed());
        assert!(exchange.body.len() <= 1000);

        let report = run_scenario(&scenario);
        assert!(report.failures.contains(FailureReason::CaptureOverflow));
        assert!(!report.failures.contains(FailureReason::Transport));
        assert!(!report.failures.contains(FailureReason::PatternMismatch));
    }
}

#[test]
fn default_capture_buffer_never_overflows() {
    init_logging();
    let exchange = exchange(&Scenario::new(DriveMode::ThreadPool).with_pool_size(2));
    assert!(!exchange.body.is_overflowed());
    assert_eq!(exchange.body.capacity(), 2048);
    assert_conformant(&exchange);
}

/// Never has content available.
#[derive(Debug)]
struct Stalled;

impl ContentReader for Stalled {
    fn read(&mut self, _: u64, _: &mut [u8], _: &mut Footers) -> Result<ReadStatus, ContentError> {
        Ok(ReadStatus::Data(0))
    }
}

#[derive(Debug)]
struct StalledHandler;

impl Handler for StalledHandler {
    type RespBody = ReaderBody<Stalled>;
    type Error = Infallible;
    type State = ();

    async fn call(&self, invocation: &Invocation<'_>, _: &mut ()) -> Result<Reply<Self::RespBody>, Infallible> {
        if !invocation.is_complete() {
            return Ok(Reply::Continue);
        }
        Ok(Reply::Respond(Response::new(ReaderBody::new(None, NonZeroUsize::new(1024).unwrap(), Stalled))))
    }
}

#[test]
fn external_drive_stops_at_the_deadline() {
    init_logging();
    let scenario = Scenario::new(DriveMode::External).with_deadline(Duration::from_secs(1));

    let started = Instant::now();
    let exchange = drive(&scenario, StalledHandler).unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert!(matches!(exchange.transport, Some(TransportError::Deadline { .. })));
    assert!(exchange.body.is_empty());
    assert_eq!(check_exchange(&exchange), FailureReason::Transport.into());

    let report = run_scenario_with(&scenario, StalledHandler);
    assert_eq!(report.code(), FailureReason::Transport.bit() << 24);
}
