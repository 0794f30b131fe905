//! An asynchronous micro HTTP/1.1 server with callback driven streaming responses.
//!
//! The crate is the server half of the `chunkcheck` conformance harness. It is
//! built on tokio and focuses on the parts of HTTP/1.1 that matter for streamed
//! responses:
//!
//! - Chunked transfer encoding with trailer fields, in both directions
//! - Content-length and close-delimited response framing
//! - Keep-alive connections and `Connection: close`
//! - Expect-continue mechanism
//! - A multi-call handler contract that defers the response until the request is known
//! - Four threading modes, one of them driven entirely by the caller
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::num::NonZeroUsize;
//!
//! use chunkcheck_http::handler::{Handler, Invocation, Reply};
//! use chunkcheck_http::protocol::body::{ContentReader, ReadStatus, ReaderBody};
//! use chunkcheck_http::protocol::{ContentError, Footers};
//! use chunkcheck_http::server::{Server, ThreadingMode};
//! use http::Response;
//!
//! struct Countdown;
//!
//! impl ContentReader for Countdown {
//!     fn read(&mut self, pos: u64, buf: &mut [u8], footers: &mut Footers) -> Result<ReadStatus, ContentError> {
//!         if pos == 3 {
//!             footers.add("Footer", "done")?;
//!             return Ok(ReadStatus::EndOfStream);
//!         }
//!         buf[0] = b'3' - pos as u8;
//!         Ok(ReadStatus::Data(1))
//!     }
//! }
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     type RespBody = ReaderBody<Countdown>;
//!     type Error = Infallible;
//!     type State = ();
//!
//!     async fn call(&self, invocation: &Invocation<'_>, _: &mut ()) -> Result<Reply<Self::RespBody>, Infallible> {
//!         if !invocation.is_complete() {
//!             return Ok(Reply::Continue);
//!         }
//!         let body = ReaderBody::new(None, NonZeroUsize::new(1024).unwrap(), Countdown);
//!         Ok(Reply::Respond(Response::new(body)))
//!     }
//! }
//!
//! let server = Server::builder().port(8080).mode(ThreadingMode::InternalPolling).start(Hello).unwrap();
//! std::thread::park();
//! # drop(server);
//! ```
//!
//! # Architecture
//!
//! - [`server`]: lifecycle, threading modes and external driving
//! - [`connection`]: the per-connection request/response loop
//! - [`handler`]: the handler contract
//! - [`protocol`]: protocol types, streaming bodies and error types
//! - [`codec`]: request decoding and response encoding
//!
//! # Limitations
//!
//! - HTTP/1.x only, no TLS
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
