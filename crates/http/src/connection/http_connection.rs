use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, EXPECT, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::{ConnectionId, Handler, Invocation, Reply};
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};
use crate::utils::has_token;

/// Whether the connection can serve another request after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persistence {
    KeepAlive,
    Close,
}

/// An HTTP connection that manages request processing and response streaming
///
/// `HttpConnection` handles the full lifecycle of an HTTP/1.x connection:
/// - Reading and decoding requests, bodies and request trailers
/// - Invoking the handler per stage until it queues a response
/// - Handling the expect-continue mechanism
/// - Choosing the response framing and streaming the body back
/// - Keeping the connection alive or closing it after the response
pub struct HttpConnection<R, W> {
    id: ConnectionId,
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    sending: Option<Arc<AtomicBool>>,
}

impl<R, W> fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            id: ConnectionId::next(),
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            sending: None,
        }
    }

    /// Shares a flag that is raised while a response is being written.
    pub fn with_sending_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.sending = Some(flag);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if self.do_process(header, payload_size, handler.as_ref()).await? == Persistence::Close {
                        self.shutdown().await;
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!(connection = %self.id, "receive body while expecting a request head");
                    self.do_send_response(build_error_response(StatusCode::BAD_REQUEST), Persistence::Close, true).await?;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    warn!(connection = %self.id, cause = %e, "can't receive next request");
                    self.do_send_response(build_error_response(StatusCode::BAD_REQUEST), Persistence::Close, true).await?;
                    return Err(e.into());
                }

                None => {
                    debug!(connection = %self.id, "can't read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<Persistence, HttpError>
    where
        H: Handler,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let mut state = H::State::default();

        let mut reply = handler.call(&Invocation::headers(self.id, &header), &mut state).await;

        if matches!(reply, Ok(Reply::Continue)) && !payload_size.is_empty() {
            self.send_continue(&header).await?;
        }

        let mut footers: Option<HeaderMap> = None;
        while !matches!(reply, Ok(Reply::Reject)) {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(data)))) => {
                    if matches!(reply, Ok(Reply::Continue)) {
                        reply = handler.call(&Invocation::upload(self.id, &header, &data), &mut state).await;
                    }
                }
                Some(Ok(Message::Payload(PayloadItem::Trailers(fields)))) => footers = Some(fields),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => {
                    return Err(ParseError::invalid_body("receive request head while reading body").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ParseError::invalid_body("connection closed before the request body ended").into()),
            }
        }

        if matches!(reply, Ok(Reply::Continue)) {
            reply = handler.call(&Invocation::complete(self.id, &header, footers.as_ref()), &mut state).await;
        }

        match reply {
            Ok(Reply::Respond(response)) => {
                let persistence = persistence(&header, response.headers());
                self.do_send_response(response, persistence, header.accepts_chunked()).await
            }
            Ok(Reply::Reject) => {
                info!(connection = %self.id, method = %header.method(), path = header.uri().path(), "request rejected, closing connection");
                Ok(Persistence::Close)
            }
            Ok(Reply::Continue) => {
                error!(connection = %self.id, "handler queued no response for a complete request");
                self.do_send_response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR), Persistence::Close, true).await
            }
            Err(e) => {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(connection = %self.id, cause = %cause, "handle response error");
                let persistence = persistence(&header, &HeaderMap::new());
                self.do_send_response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR), persistence, true).await
            }
        }
    }

    async fn send_continue(&mut self, header: &RequestHeader) -> Result<(), HttpError> {
        let Some(value) = header.headers().get(EXPECT) else {
            return Ok(());
        };
        if !value.as_bytes().eq_ignore_ascii_case(b"100-continue") {
            return Ok(());
        }

        let writer = self.framed_write.get_mut();
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
        writer.flush().await.map_err(SendError::io)?;
        info!(connection = %self.id, "receive expect request header, sent continue response");
        Ok(())
    }

    async fn do_send_response<T>(&mut self, response: Response<T>, persistence: Persistence, accepts_chunked: bool) -> Result<Persistence, HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        if let Some(flag) = &self.sending {
            flag.store(true, Ordering::Release);
        }
        let result = self.write_response(response, persistence, accepts_chunked).await;
        if let Some(flag) = &self.sending {
            flag.store(false, Ordering::Release);
        }
        result
    }

    async fn write_response<T>(&mut self, response: Response<T>, persistence: Persistence, accepts_chunked: bool) -> Result<Persistence, HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (mut header_parts, mut body) = response.into_parts();

        let forced_chunked =
            header_parts.headers.get_all(TRANSFER_ENCODING).iter().any(|value| has_token(value.as_bytes(), b"chunked"));

        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None if !accepts_chunked => PayloadSize::UntilClose,
            None if persistence == Persistence::KeepAlive || forced_chunked => PayloadSize::Chunked,
            None => PayloadSize::UntilClose,
        };

        let persistence = if payload_size.is_close_delimited() { Persistence::Close } else { persistence };
        if persistence == Persistence::Close {
            header_parts.headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        header_parts.version = Version::HTTP_11;

        debug!(connection = %self.id, status = %header_parts.status, ?payload_size, ?persistence, "sending response");

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        if !payload_size.is_empty() {
            self.framed_write.feed(header).await?;
        } else {
            // a response without body has nothing left to write after the head
            self.framed_write.send(header).await?;
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let payload_item = match frame.into_data() {
                        Ok(data) => PayloadItem::Chunk(data),
                        Err(frame) => match frame.into_trailers() {
                            Ok(trailers) => PayloadItem::Trailers(trailers),
                            Err(_) => return Err(SendError::invalid_body("unknown response body frame").into()),
                        },
                    };

                    self.framed_write.send(Message::Payload(payload_item)).await?;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    // flush, the peer may be waiting for the last-chunk
                    self.framed_write.send(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;
                    return Ok(persistence);
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(connection = %self.id, cause = %e, "shutdown connection failed");
        }
    }
}

fn persistence(header: &RequestHeader, response_headers: &HeaderMap) -> Persistence {
    let response_closes = response_headers.get_all(CONNECTION).iter().any(|value| has_token(value.as_bytes(), b"close"));
    if header.keep_alive() && !response_closes { Persistence::KeepAlive } else { Persistence::Close }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response
}
