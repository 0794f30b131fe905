//! HTTP codec module for encoding and decoding HTTP messages.
//!
//! - Request handling:
//!   - [`RequestDecoder`]: decodes request heads, bodies and chunked trailers
//! - Response handling:
//!   - [`ResponseEncoder`]: encodes response heads and bodies with the framing
//!     chosen by the connection
//!
//! Both plug into `tokio_util::codec::{FramedRead, FramedWrite}`.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
