use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::header::put_fields;
use crate::protocol::{PayloadItem, SendError};

/// Writes payload items in chunked transfer coding.
///
/// The last-chunk is written either by the trailers item (followed by the trailer
/// fields) or by EOF, whichever comes first. Items after that, including the EOF
/// that always closes the payload stream, write nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            // a zero sized chunk would end the stream
            PayloadItem::Chunk(bytes) if !bytes.has_remaining() => Ok(()),
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining();
                dst.reserve(size + 20);
                write!(helper::Writer(dst), "{size:X}\r\n")?;
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.put_slice(chunk);
                    bytes.advance(len);
                }
                dst.put_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Trailers(fields) => {
                self.eof = true;
                trace!(count = fields.len(), "writing chunked trailers");
                dst.put_slice(b"0\r\n");
                put_fields(dst, &fields);
                dst.put_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue};

    fn encode(encoder: &mut ChunkedEncoder, item: PayloadItem, dst: &mut BytesMut) {
        encoder.encode(item, dst).unwrap();
    }

    #[test]
    fn chunks_use_hex_sizes() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encode(&mut encoder, PayloadItem::Chunk(Bytes::from(vec![b'A'; 128])), &mut dst);
        assert!(dst.starts_with(b"80\r\nAAAA"));
        assert!(dst.ends_with(b"A\r\n"));
        assert_eq!(dst.len(), 4 + 128 + 2);
    }

    #[test]
    fn trailers_end_the_stream() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        let mut fields = HeaderMap::new();
        fields.insert("footer", HeaderValue::from_static("working"));

        encode(&mut encoder, PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst);
        encode(&mut encoder, PayloadItem::Trailers(fields), &mut dst);
        encode(&mut encoder, PayloadItem::Eof, &mut dst);

        assert_eq!(&dst[..], b"5\r\nhello\r\n0\r\nFooter: working\r\n\r\n");
        assert!(encoder.is_finish());
    }

    #[test]
    fn eof_without_trailers() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encode(&mut encoder, PayloadItem::Chunk(Bytes::new()), &mut dst);
        encode(&mut encoder, PayloadItem::Eof, &mut dst);
        encode(&mut encoder, PayloadItem::Chunk(Bytes::from_static(b"late")), &mut dst);

        assert_eq!(&dst[..], b"0\r\n\r\n");
    }
}
