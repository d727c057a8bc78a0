//! Engine API bridge.
//!
//! - [`EngineBridge`]: submits payloads, announces fork choice, retrieves built
//!   payloads and negotiates capabilities
//! - [`process_payload_status`]: maps a reported payload status to an outcome
//! - [`EngineError`]: six-kind error taxonomy of every bridge call
//! - [`CapabilityRegistry`]: swap-on-write snapshot of negotiated capabilities
//! - [`EngineTransport`]: request/response seam, [`JsonRpcTransport`] on the wire

mod bridge;
mod capabilities;
mod config;
mod context;
mod error;
mod fork;
mod metrics;
mod status;
mod transport;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bridge::EngineBridge;
pub use capabilities::{
    supported_capabilities, CapabilityRegistry, CapabilitySet, SUPPORTED_CAPABILITIES,
};
pub use config::{
    EngineClientConfig, DEFAULT_EXCHANGE_CAPABILITIES_TIMEOUT, DEFAULT_FORKCHOICE_UPDATED_TIMEOUT,
    DEFAULT_GET_PAYLOAD_TIMEOUT, DEFAULT_NEW_PAYLOAD_TIMEOUT, DEFAULT_RPC_URL,
};
pub use context::{CallContext, Deadline};
pub use error::{
    EngineApiErrorCode, EngineError, EngineErrorKind, ProtocolViolation, TransportError,
    TransportResult,
};
pub use fork::{EngineFork, EngineMethod, UnsupportedForkVersion};
pub use metrics::{EngineMetrics, EngineOperation, METRIC_REQUEST_DURATION, METRIC_TIMEOUTS};
pub use status::process_payload_status;
pub use transport::{connect_http, EngineTransport, JsonRpcTransport};
pub use types::{
    BlobsBundle, BuiltPayload, ExecutionPayloadEnvelope, ForkchoiceState, ForkchoiceUpdated,
    NewPayloadRequest, PayloadAttributes, PayloadId, PayloadStatusKind, PayloadStatusResult,
};
