//! HTTP request head decoder.
//!
//! Parses the request line and header fields with `httparse`, copies them into an
//! `http::Request<()>` and chooses how the request body is delimited.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request, Version, header};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request heads implementing the [`Decoder`] trait.
///
/// Yields the parsed [`RequestHeader`] together with the [`PayloadSize`] derived
/// from its `Content-Length` and `Transfer-Encoding` headers.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        let head_len = match status {
            Status::Complete(head_len) => head_len,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_len, "parsed request head");
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        if let Some(fields) = builder.headers_mut() {
            fields.reserve(req.headers.len());
            for field in req.headers.iter() {
                let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
                let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
                fields.append(name, value);
            }
        }

        let request = builder.body(()).map_err(|e| match e {
            e if e.is::<http::uri::InvalidUri>() => ParseError::InvalidUri,
            e if e.is::<http::method::InvalidMethod>() => ParseError::InvalidMethod,
            e => ParseError::invalid_header(e),
        })?;

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;

        let _ = src.split_to(head_len);
        Ok(Some((header, payload_size)))
    }
}

/// Chooses the request body framing, following RFC 9112 section 6.
///
/// A body announced by the client is always honored, whatever the method, so the
/// connection stays in sync for the next request.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let te_header = header.headers().get(header::TRANSFER_ENCODING);
    let mut cl_headers = header.headers().get_all(header::CONTENT_LENGTH).iter();

    match (te_header, cl_headers.next()) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            ensure!(
                header.headers().get_all(header::TRANSFER_ENCODING).iter().count() == 1,
                ParseError::invalid_body("multiple transfer-encoding headers")
            );
            ensure!(is_chunked(te_value), ParseError::invalid_body("transfer-encoding must end with chunked"));
            Ok(PayloadSize::Chunked)
        }

        (None, Some(cl_value)) => {
            ensure!(cl_headers.all(|other| other == cl_value), ParseError::invalid_content_length("conflicting values"));

            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) })
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Checks if chunked is the final coding of a Transfer-Encoding value.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
