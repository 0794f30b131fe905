use std::num::NonZeroUsize;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use tracing::trace;

use crate::protocol::{ContentError, Footers};

/// Outcome of one pull from a [`ContentReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were written to the front of the buffer. Zero means nothing is
    /// available yet and the reader will be asked again.
    Data(usize),
    /// No more content. Footers registered during this call are sent after the last chunk.
    EndOfStream,
}

/// Pull callback producing the content of a streaming response.
///
/// The reader is called with strictly increasing positions, from one execution
/// context at a time, and is dropped together with the response, whether the
/// stream completed or the connection was aborted.
#[cfg_attr(test, mockall::automock)]
pub trait ContentReader: Send {
    /// Writes up to `buf.len()` bytes of content starting at `position`.
    fn read(&mut self, position: u64, buf: &mut [u8], footers: &mut Footers) -> Result<ReadStatus, ContentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Trailers,
    Done,
}

/// A response body backed by a [`ContentReader`].
///
/// With an unknown size the connection picks chunked encoding (or close-delimited
/// framing for clients that can't take chunks); with a known size it sends a
/// `Content-Length` and never asks the reader past it.
#[derive(Debug)]
pub struct ReaderBody<R> {
    reader: R,
    position: u64,
    size: Option<u64>,
    block_size: NonZeroUsize,
    buffer: BytesMut,
    footers: Footers,
    state: State,
}

impl<R: ContentReader> ReaderBody<R> {
    /// Creates a body of `size` bytes (`None` when unknown in advance), read in blocks of `block_size`.
    pub fn new(size: Option<u64>, block_size: NonZeroUsize, reader: R) -> Self {
        Self {
            reader,
            position: 0,
            size,
            block_size,
            buffer: BytesMut::with_capacity(block_size.get()),
            footers: Footers::new(),
            state: State::Streaming,
        }
    }

    /// Number of content bytes produced so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn block_size(&self) -> usize {
        self.block_size.get()
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn next_capacity(&self) -> Option<usize> {
        match self.size {
            Some(size) if self.position >= size => None,
            Some(size) => {
                let remaining = size - self.position;
                Some(usize::try_from(remaining).map_or(self.block_size.get(), |r| r.min(self.block_size.get())))
            }
            None => Some(self.block_size.get()),
        }
    }

    fn fail(&mut self, error: ContentError) -> Poll<Option<Result<Frame<Bytes>, ContentError>>> {
        self.state = State::Done;
        Poll::Ready(Some(Err(error)))
    }
}

impl<R: ContentReader + Unpin> Body for ReaderBody<R> {
    type Data = Bytes;
    type Error = ContentError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        loop {
            match this.state {
                State::Done => return Poll::Ready(None),
                State::Trailers => {
                    this.state = State::Done;
                    if this.footers.is_empty() {
                        return Poll::Ready(None);
                    }
                    trace!(count = this.footers.len(), "content finished with footers");
                    return Poll::Ready(Some(Ok(Frame::trailers(this.footers.take()))));
                }
                State::Streaming => {}
            }

            let Some(capacity) = this.next_capacity() else {
                this.state = State::Trailers;
                continue;
            };

            this.buffer.resize(capacity, 0);
            let status = this.reader.read(this.position, &mut this.buffer[..capacity], &mut this.footers);
            match status {
                Ok(ReadStatus::Data(0)) => {
                    this.buffer.clear();
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
                Ok(ReadStatus::Data(written)) if written > capacity => {
                    return this.fail(ContentError::Overrun { written, capacity });
                }
                Ok(ReadStatus::Data(written)) => {
                    this.position += written as u64;
                    this.buffer.truncate(written);
                    return Poll::Ready(Some(Ok(Frame::data(this.buffer.split().freeze()))));
                }
                Ok(ReadStatus::EndOfStream) => {
                    this.buffer.clear();
                    if let Some(declared) = this.size.filter(|size| this.position < *size) {
                        return this.fail(ContentError::Truncated { position: this.position, declared });
                    }
                    this.state = State::Trailers;
                }
                Err(e) => return this.fail(e),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.state == State::Done
    }

    fn size_hint(&self) -> SizeHint {
        match self.size {
            Some(size) => SizeHint::with_exact(size.saturating_sub(self.position)),
            None => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use mockall::predicate::{always, eq};

    fn block(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).unwrap()
    }

    #[tokio::test]
    async fn unknown_size_streams_until_end_and_sends_footers() {
        let mut reader = MockContentReader::new();
        let mut seq = mockall::Sequence::new();
        reader.expect_read().with(eq(0), always(), always()).times(1).in_sequence(&mut seq).returning(|_, buf, _| {
            buf[..4].copy_from_slice(b"abcd");
            Ok(ReadStatus::Data(4))
        });
        reader.expect_read().with(eq(4), always(), always()).times(1).in_sequence(&mut seq).returning(|_, _, footers| {
            footers.add("Footer", "working").unwrap();
            Ok(ReadStatus::EndOfStream)
        });

        let mut body = ReaderBody::new(None, block(16), reader);
        assert!(body.size_hint().exact().is_none());

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"abcd"));

        let frame = body.frame().await.unwrap().unwrap();
        let trailers = frame.into_trailers().unwrap();
        assert_eq!(trailers.get("footer").unwrap(), "working");

        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn known_size_never_reads_past_the_end() {
        let mut reader = MockContentReader::new();
        reader.expect_read().times(2).returning(|_, buf, _| {
            buf.fill(b'x');
            Ok(ReadStatus::Data(buf.len()))
        });

        let mut body = ReaderBody::new(Some(6), block(4), reader);
        assert_eq!(body.size_hint().exact(), Some(6));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"xxxxxx");
    }

    #[tokio::test]
    async fn early_end_of_known_size_is_an_error() {
        let mut reader = MockContentReader::new();
        reader.expect_read().times(1).returning(|_, _, _| Ok(ReadStatus::EndOfStream));

        let mut body = ReaderBody::new(Some(10), block(4), reader);
        let error = body.frame().await.unwrap().unwrap_err();
        assert!(matches!(error, ContentError::Truncated { position: 0, declared: 10 }));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn reader_error_aborts_the_stream() {
        let mut reader = MockContentReader::new();
        reader.expect_read().times(1).returning(|_, _, _| Err(ContentError::reader("disk gone")));

        let mut body = ReaderBody::new(None, block(4), reader);
        assert!(body.frame().await.unwrap().is_err());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn overrun_is_reported() {
        let mut reader = MockContentReader::new();
        reader.expect_read().times(1).returning(|_, _, _| Ok(ReadStatus::Data(99)));

        let mut body = ReaderBody::new(None, block(4), reader);
        let error = body.frame().await.unwrap().unwrap_err();
        assert!(matches!(error, ContentError::Overrun { written: 99, capacity: 4 }));
    }

    #[test]
    fn reader_is_released_with_the_body() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Releasing(Arc<AtomicBool>);

        impl ContentReader for Releasing {
            fn read(&mut self, _: u64, _: &mut [u8], _: &mut Footers) -> Result<ReadStatus, ContentError> {
                Ok(ReadStatus::EndOfStream)
            }
        }

        impl Drop for Releasing {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let body = ReaderBody::new(None, block(4), Releasing(Arc::clone(&released)));
        assert!(!released.load(Ordering::SeqCst));
        drop(body);
        assert!(released.load(Ordering::SeqCst));
    }
}
