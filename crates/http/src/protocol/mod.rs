//! Core HTTP protocol abstractions.
//!
//! This module provides the building blocks the codec and connection layers share:
//!
//! - **Message Handling** ([`message`]): header or payload items and framing sizes
//!   - [`Message`]: Represents either headers or payload chunks
//!   - [`PayloadItem`]: A chunk, the trailer fields, or EOF
//!   - [`PayloadSize`]: How the payload is delimited on the wire
//!
//! - **Request Processing** ([`request`]): [`RequestHeader`] with keep-alive negotiation
//!
//! - **Response Processing** ([`response`]): [`ResponseHead`], validated header
//!   registration through [`ResponseExt`] and [`Footers`]
//!
//! - **Streaming Content** ([`body`]): [`body::ReaderBody`] over a pull callback
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Request parsing errors
//!   - [`SendError`]: Response sending errors
//!   - [`ContentError`]: Failures raised while generating content
//!   - [`HeaderError`]: Rejected header or footer entries

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::Footers;
pub use response::ResponseExt;
pub use response::ResponseHead;

mod error;
pub use error::ContentError;
pub use error::HeaderError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
