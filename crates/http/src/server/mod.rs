//! Server lifecycle: binding, threading modes and external driving.
//!
//! | mode                                | threads                                   |
//! |-------------------------------------|-------------------------------------------|
//! | [`ThreadingMode::InternalPolling`]  | one, polling the listener and connections |
//! | [`ThreadingMode::ThreadPerConnection`] | an acceptor plus one per connection    |
//! | [`ThreadingMode::ThreadPool`]       | `size` workers sharing the listener       |
//! | [`ThreadingMode::External`]         | none, see [`Server::run`]                 |
//!
//! Every thread runs its own current-thread tokio runtime; an externally driven
//! server owns one that only advances inside [`Server::run`].
//!
//! ```no_run
//! use chunkcheck_http::server::{Server, ThreadingMode};
//! # fn demo<H: chunkcheck_http::server::ServeHandler>(handler: H) -> Result<(), chunkcheck_http::server::ServerError> {
//! let server = Server::builder().port(0).mode(ThreadingMode::InternalPolling).start(handler)?;
//! println!("listening on {}", server.port());
//! server.stop();
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;

use http_body::Body;

use crate::handler::Handler;

mod accept;
mod daemon;
mod error;
#[cfg(unix)]
mod external;
mod options;

pub use daemon::Server;
pub use error::ServerError;
#[cfg(unix)]
pub use external::Readiness;
pub use options::{ServerBuilder, ThreadingMode};

/// Handlers a [`Server`] can share between its threads.
pub trait ServeHandler:
    Handler<Error: Send, RespBody: Body<Data: Send, Error: Display + Send> + Send + Unpin + 'static> + Send + Sync + 'static
{
}

impl<H> ServeHandler for H where
    H: Handler<Error: Send, RespBody: Body<Data: Send, Error: Display + Send> + Send + Unpin + 'static> + Send + Sync + 'static
{
}
