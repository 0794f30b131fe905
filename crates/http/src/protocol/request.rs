//! HTTP request header handling implementation.
//!
//! Wraps `http::Request<()>` with the connection related queries the server
//! needs: keep-alive negotiation and whether chunked responses are understood.

use http::{HeaderMap, Method, Request, Uri, Version, header};

use crate::utils::has_token;

/// The head of a received request.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the client allows the connection to stay open after the response.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close` is sent, HTTP/1.0 only
    /// with an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get_all(header::CONNECTION);
        match self.version() {
            Version::HTTP_11 => !connection.iter().any(|value| has_token(value.as_bytes(), b"close")),
            Version::HTTP_10 => connection.iter().any(|value| has_token(value.as_bytes(), b"keep-alive")),
            _ => false,
        }
    }

    /// Whether a chunked response can be understood by this client.
    pub fn accepts_chunked(&self) -> bool {
        self.version() >= Version::HTTP_11
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, connection: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/hello_world").version(version);
        if let Some(value) = connection {
            builder = builder.header(header::CONNECTION, value);
        }
        RequestHeader::from(builder.body(()).unwrap())
    }

    #[test]
    fn http_11_is_persistent_by_default() {
        assert!(header(Version::HTTP_11, None).keep_alive());
        assert!(header(Version::HTTP_11, Some("keep-alive")).keep_alive());
    }

    #[test]
    fn connection_close_ends_persistence() {
        assert!(!header(Version::HTTP_11, Some("close")).keep_alive());
        assert!(!header(Version::HTTP_11, Some("Upgrade, Close")).keep_alive());
    }

    #[test]
    fn http_10_needs_explicit_keep_alive() {
        assert!(!header(Version::HTTP_10, None).keep_alive());
        assert!(header(Version::HTTP_10, Some("Keep-Alive")).keep_alive());
        assert!(!header(Version::HTTP_10, None).accepts_chunked());
    }

    #[test]
    fn accessors_reflect_the_request() {
        let header = header(Version::HTTP_11, None);
        assert_eq!(header.method(), Method::GET);
        assert_eq!(header.uri().path(), "/hello_world");
        assert!(header.accepts_chunked());
        assert!(header.headers().is_empty());
    }
}
