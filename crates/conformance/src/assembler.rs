//! Builds the streamed response around a fresh [`PatternGenerator`].

use std::num::NonZeroUsize;

use chunkcheck_http::protocol::body::ReaderBody;
use chunkcheck_http::protocol::{HeaderError, ResponseExt};
use http::{Response, header};

use crate::pattern::PatternGenerator;

/// Block size the server pulls content in.
pub const BLOCK_SIZE: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// The response body type of the checked exchange.
pub type PatternBody = ReaderBody<PatternGenerator>;

/// Wraps generation state into a response of unknown length.
///
/// With `force_chunked` the response carries `Transfer-Encoding: chunked`
/// itself, so the server keeps chunked framing even when the client asked for
/// `Connection: close` and a close-delimited body would otherwise be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseAssembler {
    force_chunked: bool,
    block_size: NonZeroUsize,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ResponseAssembler {
    pub fn new(force_chunked: bool) -> Self {
        Self { force_chunked, block_size: BLOCK_SIZE }
    }

    pub fn with_block_size(mut self, block_size: NonZeroUsize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn force_chunked(&self) -> bool {
        self.force_chunked
    }

    pub fn assemble(&self, generator: PatternGenerator) -> Result<Response<PatternBody>, HeaderError> {
        let mut response = Response::new(ReaderBody::new(None, self.block_size, generator));
        if self.force_chunked {
            response.add_header(header::TRANSFER_ENCODING.as_str(), "chunked")?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{BODY_LEN, FOOTER_VALUE, expected_body};
    use http::StatusCode;
    use http_body::Body;
    use http_body_util::BodyExt;

    #[test]
    fn unknown_size_without_forced_encoding() {
        let response = ResponseAssembler::default().assemble(PatternGenerator::new()).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert_eq!(response.body().size_hint().exact(), None);
        assert_eq!(response.body().block_size(), 1024);
    }

    #[test]
    fn forced_chunked_header() {
        let response = ResponseAssembler::new(true).assemble(PatternGenerator::new()).unwrap();

        let values: Vec<_> = response.headers().get_all(header::TRANSFER_ENCODING).iter().collect();
        assert_eq!(values, vec!["chunked"]);
    }

    #[tokio::test]
    async fn streams_pattern_then_footer() {
        let response = ResponseAssembler::new(true).assemble(PatternGenerator::new()).unwrap();

        let collected = response.into_body().collect().await.unwrap();
        let trailers = collected.trailers().cloned().unwrap();
        assert_eq!(trailers.get("Footer").unwrap(), FOOTER_VALUE);

        let body = collected.to_bytes();
        assert_eq!(body.len(), BODY_LEN);
        assert_eq!(&body[..], &expected_body()[..]);
    }

    #[tokio::test]
    async fn small_blocks_still_hold_a_segment() {
        let assembler = ResponseAssembler::default().with_block_size(NonZeroUsize::new(128).unwrap());
        let mut body = assembler.assemble(PatternGenerator::new()).unwrap().into_body();

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().len(), 128);
        assert_eq!(body.position(), 128);
    }
}
