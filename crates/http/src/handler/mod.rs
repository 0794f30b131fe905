//! Request handler contract.
//!
//! A handler is invoked several times for one request, each time with an
//! [`Invocation`] describing how far the connection has got:
//!
//! 1. once when the request head is complete ([`Stage::Headers`])
//! 2. once per received request body chunk ([`Stage::Upload`])
//! 3. once after the body, with the request trailers if any ([`Stage::Complete`])
//!
//! Every call returns a [`Reply`]. The first `Reply::Respond` queues the response
//! and ends the invocations for that request; the remaining body is still drained
//! so the connection can be reused. State that must survive between the calls of
//! one request lives in [`LocalHandler::State`], created fresh for every request.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http::{HeaderMap, Method, Response, Uri};
use http_body::Body;

use crate::protocol::RequestHeader;

/// Identity of one accepted connection, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How far request processing has got when the handler is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The request head is known, the body (if any) has not been read.
    Headers,
    /// A chunk of the request body is available.
    Upload,
    /// The request has been fully received.
    Complete,
}

/// One call of the handler for a request.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    connection: ConnectionId,
    header: &'a RequestHeader,
    stage: Stage,
    upload: Option<&'a Bytes>,
    footers: Option<&'a HeaderMap>,
}

impl<'a> Invocation<'a> {
    pub fn headers(connection: ConnectionId, header: &'a RequestHeader) -> Self {
        Self { connection, header, stage: Stage::Headers, upload: None, footers: None }
    }

    pub fn upload(connection: ConnectionId, header: &'a RequestHeader, data: &'a Bytes) -> Self {
        Self { connection, header, stage: Stage::Upload, upload: Some(data), footers: None }
    }

    pub fn complete(connection: ConnectionId, header: &'a RequestHeader, footers: Option<&'a HeaderMap>) -> Self {
        Self { connection, header, stage: Stage::Complete, upload: None, footers }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn header(&self) -> &'a RequestHeader {
        self.header
    }

    pub fn method(&self) -> &'a Method {
        self.header.method()
    }

    pub fn uri(&self) -> &'a Uri {
        self.header.uri()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The request body chunk of an [`Stage::Upload`] call.
    pub fn upload_data(&self) -> Option<&'a Bytes> {
        self.upload
    }

    /// Trailer fields the client sent after a chunked request body.
    pub fn request_footers(&self) -> Option<&'a HeaderMap> {
        self.footers
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }
}

/// What the handler wants the connection to do next.
#[derive(Debug)]
pub enum Reply<B> {
    /// Keep going, no response yet.
    Continue,
    /// Queue this response.
    Respond(Response<B>),
    /// Refuse the request; the connection is closed without a response.
    Reject,
}

#[trait_variant::make(Handler: Send)]
pub trait LocalHandler {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;
    /// Per request state, shared by every invocation of one request.
    type State: Default + Send;

    async fn call(&self, invocation: &Invocation<'_>, state: &mut Self::State) -> Result<Reply<Self::RespBody>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(format!("{a}"), format!("#{}", a.get()));
    }

    #[test]
    fn invocation_stages() {
        let header = RequestHeader::from(Request::get("/hello_world").body(()).unwrap());
        let id = ConnectionId::next();
        let data = Bytes::from_static(b"abc");
        let mut footers = HeaderMap::new();
        footers.insert("checksum", "1".parse().unwrap());

        let first = Invocation::headers(id, &header);
        assert_eq!(first.stage(), Stage::Headers);
        assert_eq!(first.method(), Method::GET);
        assert!(first.upload_data().is_none());

        let upload = Invocation::upload(id, &header, &data);
        assert_eq!(upload.upload_data().unwrap(), &data);

        let last = Invocation::complete(id, &header, Some(&footers));
        assert!(last.is_complete());
        assert_eq!(last.request_footers().unwrap().get("checksum").unwrap(), "1");
        assert_eq!(last.uri().path(), "/hello_world");
        assert_eq!(last.connection(), id);
    }
}
