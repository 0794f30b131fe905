use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::ensure;
use crate::protocol::{PayloadItem, SendError};

/// Writes a payload of announced length, checking that exactly that many bytes pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining() as u64;
                ensure!(
                    size <= self.remaining,
                    SendError::invalid_body(format!("chunk of {size} bytes exceeds the remaining {} bytes", self.remaining))
                );
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.put_slice(chunk);
                    bytes.advance(len);
                }
                self.remaining -= size;
                Ok(())
            }
            PayloadItem::Trailers(fields) => {
                warn!(count = fields.len(), "dropping trailers of a content-length payload");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                ensure!(
                    self.remaining == 0,
                    SendError::invalid_body(format!("payload ended {} bytes short of its length", self.remaining))
                );
                Ok(())
            }
        }
    }
}
