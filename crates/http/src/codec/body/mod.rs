//! HTTP body framing for request and response payloads.
//!
//! ## Decoders
//! - [`PayloadDecoder`]: request bodies, delegating to a chunked or length decoder
//!
//! ## Encoders
//! - [`PayloadEncoder`]: response bodies, chunked (with trailers), content-length
//!   or close-delimited

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
