//! Configuration of one drive run.

use std::fmt;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use chunkcheck_http::server::ThreadingMode;

use crate::assembler::ResponseAssembler;
use crate::capture::DEFAULT_CAPACITY;

/// Path of the checked resource.
pub const DEFAULT_PATH: &str = "/hello_world";

/// Blocking transfer timeout, also the connect timeout of threaded scenarios.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(150);

/// Connect timeout of the externally driven scenario.
pub const EXTERNAL_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall bound of the externally driven scenario.
pub const EXTERNAL_DEADLINE: Duration = Duration::from_secs(5);

/// The server threading configuration a scenario runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveMode {
    InternalPolling,
    ThreadPerConnection,
    ThreadPool,
    External,
}

impl DriveMode {
    /// Every mode, in the order the harness runs them.
    pub const ALL: [DriveMode; 4] = [Self::InternalPolling, Self::ThreadPerConnection, Self::ThreadPool, Self::External];

    /// Position in [`DriveMode::ALL`], used to place failure codes.
    pub fn index(self) -> u32 {
        match self {
            Self::InternalPolling => 0,
            Self::ThreadPerConnection => 1,
            Self::ThreadPool => 2,
            Self::External => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InternalPolling => "internal-polling",
            Self::ThreadPerConnection => "thread-per-connection",
            Self::ThreadPool => "thread-pool",
            Self::External => "external",
        }
    }

    /// Whether the server needs threads of its own.
    pub fn needs_threads(self) -> bool {
        self != Self::External
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Worker count of the thread pool scenario: the available parallelism, at least two.
pub fn default_pool_size() -> usize {
    thread::available_parallelism().map_or(2, NonZeroUsize::get).max(2)
}

/// One drive run.
///
/// ```
/// use std::time::Duration;
/// use chunkcheck::scenario::{DriveMode, Scenario};
///
/// let scenario = Scenario::new(DriveMode::External).with_conn_close(true).with_deadline(Duration::from_secs(2));
/// assert_eq!(scenario.url(), "http://127.0.0.1/hello_world");
/// assert!(scenario.assembler().force_chunked());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    mode: DriveMode,
    conn_close: bool,
    capacity: usize,
    path: String,
    transfer_timeout: Duration,
    connect_timeout: Duration,
    deadline: Duration,
    pool_size: usize,
    error_log: bool,
}

impl Scenario {
    pub fn new(mode: DriveMode) -> Self {
        let connect_timeout = match mode {
            DriveMode::External => EXTERNAL_CONNECT_TIMEOUT,
            _ => TRANSFER_TIMEOUT,
        };
        Self {
            mode,
            conn_close: false,
            capacity: DEFAULT_CAPACITY,
            path: DEFAULT_PATH.to_owned(),
            transfer_timeout: TRANSFER_TIMEOUT,
            connect_timeout,
            deadline: EXTERNAL_DEADLINE,
            pool_size: default_pool_size(),
            error_log: true,
        }
    }

    /// Ask for `Connection: close` and make the response force chunked encoding.
    pub fn with_conn_close(mut self, conn_close: bool) -> Self {
        self.conn_close = conn_close;
        self
    }

    /// Capacity of the client capture buffer.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overall bound of an externally driven transfer.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Have the server log failed connections at `error` level.
    pub fn with_error_log(mut self, enabled: bool) -> Self {
        self.error_log = enabled;
        self
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn conn_close(&self) -> bool {
        self.conn_close
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn error_log(&self) -> bool {
        self.error_log
    }

    /// URL of the checked resource; the port is set on the client separately.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1{}", self.path)
    }

    pub fn threading(&self) -> ThreadingMode {
        match self.mode {
            DriveMode::InternalPolling => ThreadingMode::InternalPolling,
            DriveMode::ThreadPerConnection => ThreadingMode::ThreadPerConnection,
            DriveMode::ThreadPool => ThreadingMode::ThreadPool { size: self.pool_size },
            DriveMode::External => ThreadingMode::External,
        }
    }

    /// The assembler of this scenario's responses.
    pub fn assembler(&self) -> ResponseAssembler {
        ResponseAssembler::new(self.conn_close)
    }
}
