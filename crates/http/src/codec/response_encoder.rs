//! HTTP response encoder.
//!
//! Accepts a head followed by payload items, in that order, for each response on
//! the connection. The payload framing announced with the head is the one used for
//! the body. Every payload ends with [`PayloadItem::Eof`], also when a trailers item
//! already wrote the last-chunk; only then is the next head accepted.

use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};

#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let end = matches!(payload_item, PayloadItem::Eof);
                let result = payload_encoder.encode(payload_item, dst);

                if end {
                    debug_assert!(payload_encoder.is_finish());
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Response};

    #[test]
    fn chunked_response_with_footer() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let mut fields = HeaderMap::new();
        fields.insert("footer", HeaderValue::from_static("working"));

        let items: Vec<Message<(ResponseHead, PayloadSize)>> = vec![
            Message::Header((Response::new(()), PayloadSize::Chunked)),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"AB"))),
            Message::Payload(PayloadItem::Trailers(fields)),
            Message::Payload(PayloadItem::Eof),
        ];
        for item in items {
            encoder.encode(item, &mut dst).unwrap();
        }

        let encoded = String::from_utf8(dst.to_vec()).unwrap();
        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.ends_with("\r\n\r\n2\r\nAB\r\n0\r\nFooter: working\r\n\r\n"));
    }

    #[test]
    fn payload_before_head_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        let item: Message<(ResponseHead, PayloadSize)> = Message::Payload(PayloadItem::Eof);
        assert!(encoder.encode(item, &mut dst).is_err());
    }

    #[test]
    fn next_head_after_finished_payload() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let first: Message<(ResponseHead, PayloadSize)> = Message::Header((Response::new(()), PayloadSize::Empty));
        encoder.encode(first, &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let second: Message<(ResponseHead, PayloadSize)> = Message::Header((Response::new(()), PayloadSize::Length(1)));
        encoder.encode(second, &mut dst).unwrap();
    }

    #[test]
    fn next_head_after_footer_and_eof() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let mut fields = HeaderMap::new();
        fields.insert("footer", HeaderValue::from_static("working"));

        for _ in 0..2 {
            let items: Vec<Message<(ResponseHead, PayloadSize)>> = vec![
                Message::Header((Response::new(()), PayloadSize::Chunked)),
                Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"A"))),
                Message::Payload(PayloadItem::Trailers(fields.clone())),
                Message::Payload(PayloadItem::Eof),
            ];
            for item in items {
                encoder.encode(item, &mut dst).unwrap();
            }
        }

        let encoded = String::from_utf8(dst.to_vec()).unwrap();
        assert_eq!(encoded.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert_eq!(encoded.matches("1\r\nA\r\n0\r\nFooter: working\r\n\r\n").count(), 2);
    }

    #[test]
    fn head_before_eof_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let mut fields = HeaderMap::new();
        fields.insert("footer", HeaderValue::from_static("working"));

        let first: Message<(ResponseHead, PayloadSize)> = Message::Header((Response::new(()), PayloadSize::Chunked));
        encoder.encode(first, &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Trailers(fields)), &mut dst).unwrap();

        let second: Message<(ResponseHead, PayloadSize)> = Message::Header((Response::new(()), PayloadSize::Empty));
        assert!(encoder.encode(second, &mut dst).is_err());
    }
}
