//! Transport to the execution client.
//!
//! [`EngineTransport`] is the request/response seam between the bridge and the
//! execution client. Implementations put requests on the wire and report raw
//! outcomes: a `None` response means the engine answered `null`, failures are
//! [`TransportError`]s. Classification is left to the bridge.

mod jsonrpc;

pub use jsonrpc::{connect_http, JsonRpcTransport};

use super::{
    error::TransportResult,
    fork::EngineFork,
    types::{
        ExecutionPayloadEnvelope, ForkchoiceState, ForkchoiceUpdated, NewPayloadRequest,
        PayloadAttributes, PayloadId, PayloadStatusResult,
    },
};
use std::future::Future;

/// Request/response client for the Engine API.
pub trait EngineTransport: Send + Sync {
    /// `engine_newPayloadV*`, version selected by `request.fork`.
    fn new_payload(
        &self,
        request: &NewPayloadRequest,
    ) -> impl Future<Output = TransportResult<Option<PayloadStatusResult>>> + Send;

    /// `engine_forkchoiceUpdatedV*`.
    fn forkchoice_updated(
        &self,
        state: &ForkchoiceState,
        attributes: Option<&PayloadAttributes>,
        fork: EngineFork,
    ) -> impl Future<Output = TransportResult<Option<ForkchoiceUpdated>>> + Send;

    /// `engine_getPayloadV*`.
    fn get_payload(
        &self,
        payload_id: PayloadId,
        fork: EngineFork,
    ) -> impl Future<Output = TransportResult<Option<ExecutionPayloadEnvelope>>> + Send;

    /// `engine_exchangeCapabilities`.
    fn exchange_capabilities(
        &self,
        capabilities: &[String],
    ) -> impl Future<Output = TransportResult<Vec<String>>> + Send;
}
