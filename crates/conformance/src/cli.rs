//! Shared entry point of the `chunkcheck` binaries.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::FmtSubscriber;

use crate::config::HarnessConfig;
use crate::verify::run_all;

/// Installs logging, runs every scenario and maps the result to the exit status.
///
/// The aggregate failure code is printed to stderr; the process exits with
/// status 1 on any failure since exit statuses can't carry the full code.
pub fn main_with(config: &HarnessConfig) -> ExitCode {
    let subscriber = FmtSubscriber::builder().with_max_level(config.log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("can't install the log subscriber: {e}");
    }

    curl::init();
    let report = run_all(&config.scenarios());
    if report.passed() {
        return ExitCode::SUCCESS;
    }

    let code = report.code();
    error!(code, conn_close = config.conn_close, "chunked transfer checks failed");
    eprintln!("{code}");
    ExitCode::FAILURE
}
