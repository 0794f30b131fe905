//! HTTP request decoder.
//!
//! Runs a two phase state machine over the connection's read buffer: the head is
//! parsed by [`HeaderDecoder`], then the body (if any) by a [`PayloadDecoder`]
//! matching its framing, after which the next request head is expected.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// A decoder for HTTP requests that handles both headers and payload.
///
/// - `payload_decoder == None`: parsing a request head
/// - `payload_decoder == Some(_)`: parsing the body of the current request
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ (PayloadItem::Chunk(_) | PayloadItem::Trailers(_))) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipelined_requests_with_chunked_body() {
        let raw = "POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\nChecksum: 1\r\n\r\nGET /hello_world HTTP/1.1\r\n\r\n";
        let mut buf = BytesMut::from(raw);
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(header.uri().path(), "/upload");
        assert!(payload_size.is_chunked());

        let Some(Message::Payload(chunk)) = decoder.decode(&mut buf).unwrap() else { panic!("expected chunk") };
        assert_eq!(&chunk.as_bytes().unwrap()[..], b"abc");

        let Some(Message::Payload(trailers)) = decoder.decode(&mut buf).unwrap() else { panic!("expected trailers") };
        assert_eq!(trailers.as_trailers().unwrap().get("checksum").unwrap(), "1");

        let Some(Message::Payload(eof)) = decoder.decode(&mut buf).unwrap() else { panic!("expected eof") };
        assert!(eof.is_eof());

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(header.uri().path(), "/hello_world");
        assert!(payload_size.is_empty());
    }

    #[test]
    fn bodyless_request_yields_eof() {
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
        let mut decoder = RequestDecoder::new();

        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header(_))));
        let Some(Message::Payload(eof)) = decoder.decode(&mut buf).unwrap() else { panic!("expected eof") };
        assert!(eof.is_eof());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
