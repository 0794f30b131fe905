//! Streaming response content.
//!
//! A [`ReaderBody`] adapts a pull-style [`ContentReader`] to the `http_body::Body`
//! trait so the connection can drive it like any other response body:
//!
//! - the reader is asked for at most one block of content per frame
//! - an empty read yields to the runtime and is retried later
//! - footers registered by the reader are sent as a trailers frame
//! - the reader is dropped exactly once, with the body

mod reader_body;

pub use reader_body::ContentReader;
pub use reader_body::ReadStatus;
pub use reader_body::ReaderBody;

#[cfg(test)]
pub use reader_body::MockContentReader;
