use crate::constants::FIRST_REQUEST_ID;
use crate::rpc::{
    CorrelationError, InboundFrame, RequestEnvelope, ResponseEnvelope, RpcClientError, RpcRequest,
    RpcResponse, StaleResponseError, TransportError,
};
use crate::utils::now;
use std::collections::HashMap;

/// Completion handler invoked with the routed response, or with the reason a
/// frame carrying its id could not be read.
pub type RpcCompletion = Box<dyn FnOnce(Result<RpcResponse, RpcClientError>) + Send + 'static>;

enum PendingState {
    Waiting(RpcCompletion),
    Completed,
}

/// One in-flight call.
pub struct PendingRequest {
    id: u32,
    created_at: u64,
    state: PendingState,
}

impl PendingRequest {
    fn new(id: u32, on_complete: RpcCompletion) -> Self {
        Self {
            id,
            created_at: now(),
            state: PendingState::Waiting(on_complete),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Creation timestamp in microseconds since the UNIX epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, PendingState::Completed)
    }

    /// Runs the completion handler if it has not run yet. Returns whether it ran.
    fn complete(&mut self, result: Result<RpcResponse, RpcClientError>) -> bool {
        match std::mem::replace(&mut self.state, PendingState::Completed) {
            PendingState::Waiting(on_complete) => {
                on_complete(result);
                true
            }
            PendingState::Completed => false,
        }
    }
}

/// Assigns request ids and routes responses back to their waiters.
///
/// One correlator belongs to one client session. It is not bound to a
/// particular connection: the caller supplies the emit function on every
/// [`send`](Self::send), so a supervising layer can move the correlator onto
/// a fresh connection without losing the id sequence.
///
/// Requests whose responses never arrive (for example because the connection
/// dropped) stay outstanding until the correlator itself is dropped. Dropping
/// it drops every completion handler, which callers observe as an abort.
pub struct RequestCorrelator {
    next_id: u32,
    outstanding: HashMap<u32, PendingRequest>,
    halted: bool,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_REQUEST_ID,
            outstanding: HashMap::new(),
            halted: false,
        }
    }

    /// Allocates the next id, records `on_complete` under it and hands the
    /// envelope to `on_emit` for transmission.
    ///
    /// If `on_emit` fails the entry is removed again and the transport error
    /// is returned; `on_complete` is dropped without being called.
    pub fn send<E, F>(
        &mut self,
        request: RpcRequest,
        on_emit: E,
        on_complete: F,
    ) -> Result<u32, RpcClientError>
    where
        E: FnOnce(RequestEnvelope) -> Result<(), TransportError>,
        F: FnOnce(Result<RpcResponse, RpcClientError>) + Send + 'static,
    {
        if self.halted {
            return Err(CorrelationError::Halted.into());
        }

        let id = self.allocate_id();

        if self.outstanding.contains_key(&id) {
            tracing::error!(
                "Request id {} is still outstanding; halting correlator with {} pending requests",
                id,
                self.outstanding.len()
            );
            self.halt();
            return Err(CorrelationError::DuplicateId(id).into());
        }

        self.outstanding
            .insert(id, PendingRequest::new(id, Box::new(on_complete)));

        let envelope = request.into_envelope(id);
        tracing::debug!("Sending request {}: {} {}", id, envelope.method, envelope.path);

        if let Err(err) = on_emit(envelope) {
            self.outstanding.remove(&id);
            return Err(err.into());
        }

        Ok(id)
    }

    /// Routes a response to its waiter, removing the outstanding entry.
    ///
    /// Responses for unknown or already completed ids have no effect.
    pub fn dispatch(&mut self, response: ResponseEnvelope) -> Result<u32, StaleResponseError> {
        let id = response.id;
        self.route(id, Ok(response.into_response()))
    }

    /// Routes any inbound frame. A malformed frame fails its waiter with
    /// [`RpcClientError::MalformedResponse`].
    pub fn dispatch_frame(&mut self, frame: InboundFrame) -> Result<u32, StaleResponseError> {
        match frame {
            InboundFrame::Response(response) => self.dispatch(response),
            InboundFrame::Malformed { id, reason } => {
                self.route(id, Err(RpcClientError::MalformedResponse { id, reason }))
            }
        }
    }

    fn route(
        &mut self,
        id: u32,
        result: Result<RpcResponse, RpcClientError>,
    ) -> Result<u32, StaleResponseError> {
        match self.outstanding.remove(&id) {
            Some(mut pending) => {
                if pending.complete(result) {
                    tracing::debug!("Completed request {}", id);
                    Ok(id)
                } else {
                    tracing::warn!("Request {} was already completed; response discarded", id);
                    Err(StaleResponseError { id })
                }
            }
            None => {
                tracing::warn!("No outstanding request with id {}; response discarded", id);
                Err(StaleResponseError { id })
            }
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        // Zero is never handed out.
        self.next_id = match self.next_id.wrapping_add(1) {
            0 => FIRST_REQUEST_ID,
            next => next,
        };
        id
    }

    fn halt(&mut self) {
        self.halted = true;
        // Dropping the handlers aborts every waiter instead of risking a misroute.
        self.outstanding.clear();
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The id the next `send` will use.
    pub fn peek_next_id(&self) -> u32 {
        self.next_id
    }

    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_outstanding(&self, id: u32) -> bool {
        self.outstanding
            .get(&id)
            .is_some_and(|pending| !pending.is_completed())
    }

    /// Outstanding ids in ascending order.
    pub fn outstanding_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.outstanding.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn pending_request(&self, id: u32) -> Option<&PendingRequest> {
        self.outstanding.get(&id)
    }
}
