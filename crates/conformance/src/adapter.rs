//! Binds requests to the checked response.
//!
//! The server calls the handler once when the request head arrives and again
//! once the request is complete. The adapter answers the first call with
//! [`Reply::Continue`] and only builds the response on the second one, so the
//! server has to keep the connection open across a deferred response.

use chunkcheck_http::handler::{ConnectionId, Handler, Invocation, Reply};
use chunkcheck_http::protocol::HeaderError;
use http::Method;
use tracing::{debug, trace, warn};

use crate::assembler::{PatternBody, ResponseAssembler};
use crate::pattern::PatternGenerator;

/// Where one request is in the two-call protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// No call seen yet, or the first call has been answered with "continue".
    #[default]
    Unbound,
    /// The response has been created.
    Bound,
}

/// Per request state of the adapter, created by the connection for every request.
#[derive(Debug, Default)]
pub struct AdapterState {
    phase: Phase,
    first_call: Option<ConnectionId>,
}

impl AdapterState {
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// The handler the harness binds its servers to.
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    method: Method,
    assembler: ResponseAssembler,
}

impl RequestAdapter {
    /// An adapter answering `GET` requests.
    pub fn new(assembler: ResponseAssembler) -> Self {
        Self::with_method(Method::GET, assembler)
    }

    pub fn with_method(method: Method, assembler: ResponseAssembler) -> Self {
        Self { method, assembler }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Handler for RequestAdapter {
    type RespBody = PatternBody;
    type Error = HeaderError;
    type State = AdapterState;

    async fn call(&self, invocation: &Invocation<'_>, state: &mut AdapterState) -> Result<Reply<PatternBody>, HeaderError> {
        let connection = invocation.connection();
        if *invocation.method() != self.method {
            debug!(%connection, method = %invocation.method(), "unexpected method, rejecting");
            return Ok(Reply::Reject);
        }

        match (state.phase, state.first_call) {
            (Phase::Unbound, None) => {
                trace!(%connection, stage = ?invocation.stage(), "first call, deferring the response");
                state.first_call = Some(connection);
                Ok(Reply::Continue)
            }
            (Phase::Unbound, Some(first)) => {
                debug_assert_eq!(first, connection, "request state crossed connections");
                state.phase = Phase::Bound;
                let response = self.assembler.assemble(PatternGenerator::new())?;
                trace!(%connection, force_chunked = self.assembler.force_chunked(), "response queued");
                Ok(Reply::Respond(response))
            }
            (Phase::Bound, _) => {
                warn!(%connection, "called again after the response was queued");
                Ok(Reply::Reject)
            }
        }
    }
}
