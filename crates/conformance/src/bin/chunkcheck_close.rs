//! The connection-close variant: every request carries `Connection: close`.

use std::process::ExitCode;

use chunkcheck::cli::main_with;
use chunkcheck::config::HarnessConfig;

fn main() -> ExitCode {
    main_with(&HarnessConfig::from_env().with_conn_close(true))
}
