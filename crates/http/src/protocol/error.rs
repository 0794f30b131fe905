use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Raised by a content reader; the response stream is aborted and the connection dropped.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("reader needs a buffer of at least {required} bytes, got {offered}")]
    BufferTooSmall { required: usize, offered: usize },

    #[error("reader wrote {written} bytes into a buffer of {capacity}")]
    Overrun { written: usize, capacity: usize },

    #[error("reader ended the stream at {position} before the declared size {declared}")]
    Truncated { position: u64, declared: u64 },

    #[error("reader failed: {reason}")]
    Reader { reason: String },

    #[error("footer rejected: {source}")]
    Footer {
        #[from]
        source: HeaderError,
    },
}

impl ContentError {
    pub fn reader<S: ToString>(str: S) -> Self {
        Self::Reader { reason: str.to_string() }
    }
}

/// Rejection of a header or footer entry added by the application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header name or value is empty")]
    Empty,

    #[error("header entry contains a tab, CR or LF")]
    ControlCharacter,

    #[error("invalid header name: {name}")]
    InvalidName { name: String },

    #[error("invalid header value for {name}")]
    InvalidValue { name: String },

    #[error("only one transfer-encoding header is allowed")]
    DuplicateTransferEncoding,

    #[error("unsupported transfer-encoding: {value}")]
    UnsupportedTransferEncoding { value: String },

    #[error("content-length is computed by the server")]
    ContentLength,
}
