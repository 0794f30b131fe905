use bytes::{Buf, Bytes};
use http::HeaderMap;

/// One item of a message stream: the head, then the payload items.
///
/// Requests come out of the decoder as `Message<(RequestHeader, PayloadSize)>`,
/// responses go into the encoder as `Message<(ResponseHead, PayloadSize), D>`.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// Represents an item in the HTTP message payload stream.
///
/// Decoders produce these while reading a body; encoders consume them while
/// writing one. `Trailers` only ever appears for chunked payloads and always
/// directly precedes `Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Trailer fields sent after the last chunk
    Trailers(HeaderMap),
    /// Marks the end of the payload stream
    Eof,
}

/// How a payload is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `Content-Length` bytes.
    Length(u64),
    /// Chunked transfer encoding, optionally followed by trailers.
    Chunked,
    /// Ends when the connection closes; responses only.
    UntilClose,
    /// No payload.
    Empty,
}

impl PayloadSize {
    /// Returns true if the payload uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    /// Returns true if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Returns true if the peer can only detect the end of the payload by the connection closing
    #[inline]
    pub fn is_close_delimited(&self) -> bool {
        matches!(self, PayloadSize::UntilClose)
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    /// Returns true if this item carries trailer fields
    #[inline]
    pub fn is_trailers(&self) -> bool {
        matches!(self, PayloadItem::Trailers(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Trailers(_) | PayloadItem::Eof => None,
        }
    }

    /// Returns a reference to the trailer fields if this is a Trailers item
    pub fn as_trailers(&self) -> Option<&HeaderMap> {
        match self {
            PayloadItem::Trailers(trailers) => Some(trailers),
            PayloadItem::Chunk(_) | PayloadItem::Eof => None,
        }
    }
}
