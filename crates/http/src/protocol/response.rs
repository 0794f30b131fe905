//! HTTP response header handling implementation.
//!
//! Besides the [`ResponseHead`] alias used by the encoder, this module holds the
//! rules for header and footer entries an application may add to a response:
//!
//! - names and values must be non-empty and free of tab, CR and LF
//! - at most one `Transfer-Encoding`, and only `chunked` or `identity`
//! - `Content-Length` is always computed by the server

use http::{HeaderMap, HeaderName, HeaderValue, Response, header};

use crate::ensure;
use crate::protocol::HeaderError;

/// Type alias for HTTP response headers.
///
/// This type represents the header portion of an HTTP response, using
/// `http::Response<()>` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// Validated header registration on responses.
pub trait ResponseExt {
    /// Adds a header line, applying the response header rules.
    ///
    /// Adding `Transfer-Encoding: chunked` forces chunked encoding for HTTP/1.1
    /// clients even when the connection is not kept alive.
    fn add_header(&mut self, name: &str, value: &str) -> Result<(), HeaderError>;
}

impl<B> ResponseExt for Response<B> {
    fn add_header(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let (name, value) = validate_entry(name, value)?;

        if name == header::TRANSFER_ENCODING {
            ensure!(!self.headers().contains_key(header::TRANSFER_ENCODING), HeaderError::DuplicateTransferEncoding);
            let bytes = value.as_bytes();
            ensure!(
                bytes.eq_ignore_ascii_case(b"chunked") || bytes.eq_ignore_ascii_case(b"identity"),
                HeaderError::UnsupportedTransferEncoding { value: String::from_utf8_lossy(bytes).into_owned() }
            );
        }
        ensure!(name != header::CONTENT_LENGTH, HeaderError::ContentLength);

        self.headers_mut().append(name, value);
        Ok(())
    }
}

/// Trailer fields registered on a streaming response while it is being generated.
///
/// Footers are written after the last chunk of a chunked response and dropped
/// for any other transfer framing.
#[derive(Debug, Default, Clone)]
pub struct Footers {
    fields: HeaderMap,
}

impl Footers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a footer line; the same entry rules as for headers apply.
    pub fn add(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let (name, value) = validate_entry(name, value)?;
        self.fields.append(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Takes every registered field, leaving the set empty.
    pub fn take(&mut self) -> HeaderMap {
        std::mem::take(&mut self.fields)
    }
}

fn validate_entry(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    ensure!(!name.is_empty() && !value.is_empty(), HeaderError::Empty);
    let forbidden = |c: char| matches!(c, '\t' | '\r' | '\n');
    ensure!(!name.contains(forbidden) && !value.contains(forbidden), HeaderError::ControlCharacter);

    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| HeaderError::InvalidName { name: name.to_owned() })?;
    let header_value = HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue { name: name.to_owned() })?;
    Ok((header_name, header_value))
}
