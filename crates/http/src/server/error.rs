use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("can't build the server runtime: {source}")]
    Runtime { source: io::Error },

    #[error("can't spawn server thread: {source}")]
    Thread { source: io::Error },

    #[error("thread pool needs at least one worker")]
    EmptyThreadPool,

    #[error("only an externally driven server can be stepped")]
    NotExternal,

    #[error("externally driven servers are not supported on this platform")]
    Unsupported,
}

impl ServerError {
    pub fn runtime<E: Into<io::Error>>(e: E) -> Self {
        Self::Runtime { source: e.into() }
    }

    pub fn thread<E: Into<io::Error>>(e: E) -> Self {
        Self::Thread { source: e.into() }
    }
}
