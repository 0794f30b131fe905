//! HTTP connection handling.
//!
//! [`HttpConnection`] runs the request/response loop of one client connection:
//! it decodes requests, calls the handler for each stage of a request, streams
//! the queued response with the framing the client supports, and keeps the
//! connection alive or closes it afterwards.

mod http_connection;

pub use http_connection::HttpConnection;
