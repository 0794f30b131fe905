use std::process::ExitCode;

use chunkcheck::cli::main_with;
use chunkcheck::config::HarnessConfig;

fn main() -> ExitCode {
    main_with(&HarnessConfig::from_env())
}
