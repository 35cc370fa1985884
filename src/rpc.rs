mod rpc_connection_state;
mod rpc_correlator;
mod rpc_envelope;
mod rpc_error;
mod rpc_result_status;

pub use rpc_connection_state::ConnectionState;
pub use rpc_correlator::{PendingRequest, RequestCorrelator, RpcCompletion};
pub use rpc_envelope::{
    InboundFrame, QueryValue, RequestEnvelope, ResponseEnvelope, RpcMethod, RpcRequest,
    RpcResponse,
};
pub use rpc_error::{CorrelationError, RpcClientError, StaleResponseError, TransportError};
pub use rpc_result_status::RpcResultStatus;
