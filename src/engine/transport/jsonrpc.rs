//! JSON-RPC implementation of [`EngineTransport`].

use super::EngineTransport;
use crate::engine::{
    error::{TransportError, TransportResult},
    fork::{EngineFork, EngineMethod},
    types::{
        BlobsBundle, ExecutionPayloadEnvelope, ForkchoiceState, ForkchoiceUpdated,
        NewPayloadRequest, PayloadAttributes, PayloadId, PayloadStatusResult,
    },
};
use alloy_eips::eip7685::Requests;
use alloy_primitives::U256;
use alloy_rpc_types_engine::{BlobsBundleV1, BlobsBundleV2, ExecutionPayloadV3, JwtSecret};
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::HttpClientBuilder,
    rpc_params,
};
use reth_rpc_layer::AuthClientLayer;
use serde::Deserialize;
use std::time::Duration;

/// [`EngineTransport`] over any `jsonrpsee` client.
#[derive(Debug, Clone)]
pub struct JsonRpcTransport<C> {
    client: C,
}

impl<C> JsonRpcTransport<C> {
    /// Wrap a connected client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

/// Connect to an authenticated Engine API endpoint over HTTP.
///
/// Every request carries a freshly signed JWT derived from `secret`.
pub fn connect_http(
    url: &str,
    secret: JwtSecret,
    request_timeout: Duration,
) -> TransportResult<JsonRpcTransport<impl ClientT + Send + Sync>> {
    let client = HttpClientBuilder::default()
        .request_timeout(request_timeout)
        .set_http_middleware(tower::ServiceBuilder::new().layer(AuthClientLayer::new(secret)))
        .build(url)?;
    Ok(JsonRpcTransport::new(client))
}

impl<C> EngineTransport for JsonRpcTransport<C>
where
    C: ClientT + Send + Sync,
{
    async fn new_payload(
        &self,
        request: &NewPayloadRequest,
    ) -> TransportResult<Option<PayloadStatusResult>> {
        let method = request.fork.new_payload();
        let params = if request.fork.has_execution_requests() {
            rpc_params![
                &request.payload,
                &request.versioned_hashes,
                request.parent_beacon_block_root,
                &request.execution_requests
            ]
        } else {
            rpc_params![
                &request.payload,
                &request.versioned_hashes,
                request.parent_beacon_block_root
            ]
        };
        Ok(self.client.request(method.as_str(), params).await?)
    }

    async fn forkchoice_updated(
        &self,
        state: &ForkchoiceState,
        attributes: Option<&PayloadAttributes>,
        fork: EngineFork,
    ) -> TransportResult<Option<ForkchoiceUpdated>> {
        let method = fork.forkchoice_updated();
        Ok(self.client.request(method.as_str(), rpc_params![state, attributes]).await?)
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        fork: EngineFork,
    ) -> TransportResult<Option<ExecutionPayloadEnvelope>> {
        let method = fork.get_payload();
        let envelope = match method {
            EngineMethod::GetPayloadV5 => self
                .client
                .request::<Option<EnvelopeResponse<BlobsBundleV2>>, _>(
                    method.as_str(),
                    rpc_params![payload_id],
                )
                .await?
                .map(|response| response.into_envelope(fork, BlobsBundle::V2)),
            _ => self
                .client
                .request::<Option<EnvelopeResponse<BlobsBundleV1>>, _>(
                    method.as_str(),
                    rpc_params![payload_id],
                )
                .await?
                .map(|response| response.into_envelope(fork, BlobsBundle::V1)),
        };
        Ok(envelope)
    }

    async fn exchange_capabilities(&self, capabilities: &[String]) -> TransportResult<Vec<String>> {
        let method = EngineMethod::ExchangeCapabilities;
        Ok(self.client.request(method.as_str(), rpc_params![capabilities]).await?)
    }
}

/// Wire shape of `engine_getPayloadV{3,4,5}` results. Every auxiliary member
/// is optional here so that a missing blobs bundle reaches the bridge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeResponse<B> {
    execution_payload: ExecutionPayloadV3,
    block_value: U256,
    #[serde(default)]
    blobs_bundle: Option<B>,
    #[serde(default)]
    should_override_builder: bool,
    #[serde(default)]
    execution_requests: Option<Requests>,
}

impl<B> EnvelopeResponse<B> {
    fn into_envelope(
        self,
        fork: EngineFork,
        bundle: impl FnOnce(B) -> BlobsBundle,
    ) -> ExecutionPayloadEnvelope {
        ExecutionPayloadEnvelope {
            fork,
            execution_payload: self.execution_payload,
            block_value: self.block_value,
            blobs_bundle: self.blobs_bundle.map(bundle),
            should_override_builder: self.should_override_builder,
            execution_requests: self.execution_requests,
        }
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Call(object) => Self::Rpc {
                code: object.code(),
                message: object.message().to_owned(),
                data: object.data().map(|data| data.get().to_owned()),
            },
            ClientError::RequestTimeout => Self::Timeout,
            ClientError::ParseError(err) => Self::Decode(err.to_string()),
            err @ (ClientError::Transport(_) | ClientError::RestartNeeded(_)) => {
                Self::Connection(err.to_string())
            }
            other => Self::Other(other.to_string()),
        }
    }
}
