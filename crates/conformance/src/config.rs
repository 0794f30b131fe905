//! Process level configuration of the harness binaries.

use std::env;
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;

use tracing::Level;

use crate::capture::DEFAULT_CAPACITY;
use crate::scenario::{DriveMode, Scenario, default_pool_size};

/// Set to `1`/`true`/`yes` to request `Connection: close` in every scenario.
pub const CONN_CLOSE_ENV: &str = "CHUNKCHECK_CONN_CLOSE";

/// Maximum log level, `INFO` when unset or unparsable.
pub const LOG_ENV: &str = "CHUNKCHECK_LOG";

/// Programs whose name contains this run the connection-close variant.
pub const CONN_CLOSE_SUFFIX: &str = "_close";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub conn_close: bool,
    pub log_level: Level,
    pub capacity: usize,
    pub pool_size: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self { conn_close: false, log_level: Level::INFO, capacity: DEFAULT_CAPACITY, pool_size: default_pool_size() }
    }
}

impl HarnessConfig {
    /// Reads the program name and the environment of this process.
    pub fn from_env() -> Self {
        let program = env::args_os().next();
        let conn_close = env::var(CONN_CLOSE_ENV).ok();
        let log = env::var(LOG_ENV).ok();
        Self::from_parts(program.as_deref(), conn_close.as_deref(), log.as_deref())
    }

    pub fn from_parts(program: Option<&OsStr>, conn_close: Option<&str>, log: Option<&str>) -> Self {
        let by_name = program
            .and_then(|program| Path::new(program).file_name())
            .is_some_and(|name| name.to_string_lossy().contains(CONN_CLOSE_SUFFIX));
        let by_env = conn_close.is_some_and(parse_flag);
        let log_level = log.and_then(|level| Level::from_str(level.trim()).ok()).unwrap_or(Level::INFO);

        Self { conn_close: by_name || by_env, log_level, ..Self::default() }
    }

    pub fn with_conn_close(mut self, conn_close: bool) -> Self {
        self.conn_close = conn_close;
        self
    }

    /// One scenario per drive mode, in run order.
    pub fn scenarios(&self) -> Vec<Scenario> {
        DriveMode::ALL
            .into_iter()
            .map(|mode| {
                Scenario::new(mode)
                    .with_conn_close(self.conn_close)
                    .with_capacity(self.capacity)
                    .with_pool_size(self.pool_size)
            })
            .collect()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_name_selects_conn_close() {
        let config = HarnessConfig::from_parts(Some(OsStr::new("/usr/bin/chunkcheck_close")), None, None);
        assert!(config.conn_close);

        let config = HarnessConfig::from_parts(Some(OsStr::new("/tmp/chunkcheck_close/chunkcheck")), None, None);
        assert!(!config.conn_close);

        assert!(!HarnessConfig::from_parts(None, None, None).conn_close);
    }

    #[test]
    fn environment_selects_conn_close() {
        let program = Some(OsStr::new("chunkcheck"));
        assert!(HarnessConfig::from_parts(program, Some("1"), None).conn_close);
        assert!(HarnessConfig::from_parts(program, Some(" TRUE "), None).conn_close);
        assert!(!HarnessConfig::from_parts(program, Some("0"), None).conn_close);
        assert!(!HarnessConfig::from_parts(program, Some(""), None).conn_close);
    }

    #[test]
    fn log_level() {
        assert_eq!(HarnessConfig::from_parts(None, None, None).log_level, Level::INFO);
        assert_eq!(HarnessConfig::from_parts(None, None, Some("debug")).log_level, Level::DEBUG);
        assert_eq!(HarnessConfig::from_parts(None, None, Some("TRACE")).log_level, Level::TRACE);
        assert_eq!(HarnessConfig::from_parts(None, None, Some("loud")).log_level, Level::INFO);
    }

    #[test]
    fn scenarios_cover_every_mode() {
        let config = HarnessConfig::default().with_conn_close(true);
        let scenarios = config.scenarios();

        let modes: Vec<_> = scenarios.iter().map(Scenario::mode).collect();
        assert_eq!(modes, DriveMode::ALL.to_vec());
        assert!(scenarios.iter().all(Scenario::conn_close));
        assert!(scenarios.iter().all(|scenario| scenario.capacity() == 2048));
    }
}
