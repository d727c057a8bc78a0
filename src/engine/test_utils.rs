//! Test helpers: a scripted [`EngineTransport`] and sample payloads.

use super::{
    error::{TransportError, TransportResult},
    fork::EngineFork,
    transport::EngineTransport,
    types::{
        BlobsBundle, ExecutionPayloadEnvelope, ForkchoiceState, ForkchoiceUpdated,
        NewPayloadRequest, PayloadAttributes, PayloadId, PayloadStatusResult,
    },
};
use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use alloy_rpc_types_engine::{
    BlobsBundleV1, BlobsBundleV2, ExecutionPayloadV1, ExecutionPayloadV2, ExecutionPayloadV3,
};
use parking_lot::Mutex;
use std::time::Duration;

/// A small, fully populated Cancun-shaped payload.
pub fn sample_payload() -> ExecutionPayloadV3 {
    ExecutionPayloadV3 {
        payload_inner: ExecutionPayloadV2 {
            payload_inner: ExecutionPayloadV1 {
                parent_hash: B256::repeat_byte(0x01),
                fee_recipient: Address::repeat_byte(0x02),
                state_root: B256::repeat_byte(0x03),
                receipts_root: B256::repeat_byte(0x04),
                logs_bloom: Bloom::default(),
                prev_randao: B256::repeat_byte(0x05),
                block_number: 1,
                gas_limit: 30_000_000,
                gas_used: 0,
                timestamp: 1_700_000_000,
                extra_data: Bytes::new(),
                base_fee_per_gas: U256::from(7),
                block_hash: B256::repeat_byte(0x06),
                transactions: vec![],
            },
            withdrawals: vec![],
        },
        blob_gas_used: 0,
        excess_blob_gas: 0,
    }
}

/// A `newPayload` request wrapping [`sample_payload`].
pub fn sample_new_payload_request(fork: EngineFork) -> NewPayloadRequest {
    NewPayloadRequest::new(fork, sample_payload(), vec![], B256::repeat_byte(0x07))
}

/// A well-formed envelope for `fork` with an empty blobs bundle.
pub fn sample_envelope(fork: EngineFork) -> ExecutionPayloadEnvelope {
    let blobs_bundle = match fork {
        EngineFork::Osaka => BlobsBundle::V2(BlobsBundleV2::empty()),
        EngineFork::Cancun | EngineFork::Prague => BlobsBundle::V1(BlobsBundleV1::empty()),
    };
    ExecutionPayloadEnvelope {
        fork,
        execution_payload: sample_payload(),
        block_value: U256::from(1_000),
        blobs_bundle: Some(blobs_bundle),
        should_override_builder: false,
        execution_requests: None,
    }
}

/// A request observed by [`MockEngineTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRequest {
    /// `engine_newPayload`
    NewPayload(NewPayloadRequest),
    /// `engine_forkchoiceUpdated`
    ForkchoiceUpdated {
        /// Fork-choice state sent.
        state: ForkchoiceState,
        /// Attributes sent.
        attributes: Option<PayloadAttributes>,
        /// Fork selected.
        fork: EngineFork,
    },
    /// `engine_getPayload`
    GetPayload {
        /// Payload id sent.
        payload_id: PayloadId,
        /// Fork selected.
        fork: EngineFork,
    },
    /// `engine_exchangeCapabilities`
    ExchangeCapabilities(Vec<String>),
}

type Slot<T> = Mutex<Option<TransportResult<T>>>;

/// Transport answering every method with a scripted response after an
/// optional latency. Unscripted methods fail with [`TransportError::Other`].
#[derive(Debug, Default)]
pub struct MockEngineTransport {
    new_payload: Slot<Option<PayloadStatusResult>>,
    forkchoice_updated: Slot<Option<ForkchoiceUpdated>>,
    get_payload: Slot<Option<ExecutionPayloadEnvelope>>,
    exchange_capabilities: Slot<Vec<String>>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<MockRequest>>,
}

impl MockEngineTransport {
    /// Create a transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the `newPayload` response.
    pub fn with_new_payload(self, response: TransportResult<Option<PayloadStatusResult>>) -> Self {
        *self.new_payload.lock() = Some(response);
        self
    }

    /// Script the `forkchoiceUpdated` response.
    pub fn with_forkchoice_updated(
        self,
        response: TransportResult<Option<ForkchoiceUpdated>>,
    ) -> Self {
        *self.forkchoice_updated.lock() = Some(response);
        self
    }

    /// Script the `getPayload` response.
    pub fn with_get_payload(
        self,
        response: TransportResult<Option<ExecutionPayloadEnvelope>>,
    ) -> Self {
        *self.get_payload.lock() = Some(response);
        self
    }

    /// Script the `exchangeCapabilities` response.
    pub fn with_exchange_capabilities(self, response: TransportResult<Vec<String>>) -> Self {
        self.set_exchange_capabilities(response);
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Replace the `exchangeCapabilities` response.
    pub fn set_exchange_capabilities(&self, response: TransportResult<Vec<String>>) {
        *self.exchange_capabilities.lock() = Some(response);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    fn record(&self, request: MockRequest) {
        self.requests.lock().push(request);
    }

    async fn respond<T: Clone>(&self, slot: &Slot<T>, method: &str) -> TransportResult<T> {
        let response = slot.lock().clone();
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response.unwrap_or_else(|| {
            Err(TransportError::Other(format!("no mock response for {method}")))
        })
    }
}

impl EngineTransport for MockEngineTransport {
    async fn new_payload(
        &self,
        request: &NewPayloadRequest,
    ) -> TransportResult<Option<PayloadStatusResult>> {
        self.record(MockRequest::NewPayload(request.clone()));
        self.respond(&self.new_payload, "engine_newPayload").await
    }

    async fn forkchoice_updated(
        &self,
        state: &ForkchoiceState,
        attributes: Option<&PayloadAttributes>,
        fork: EngineFork,
    ) -> TransportResult<Option<ForkchoiceUpdated>> {
        self.record(MockRequest::ForkchoiceUpdated {
            state: *state,
            attributes: attributes.cloned(),
            fork,
        });
        self.respond(&self.forkchoice_updated, "engine_forkchoiceUpdated").await
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        fork: EngineFork,
    ) -> TransportResult<Option<ExecutionPayloadEnvelope>> {
        self.record(MockRequest::GetPayload { payload_id, fork });
        self.respond(&self.get_payload, "engine_getPayload").await
    }

    async fn exchange_capabilities(&self, capabilities: &[String]) -> TransportResult<Vec<String>> {
        self.record(MockRequest::ExchangeCapabilities(capabilities.to_vec()));
        self.respond(&self.exchange_capabilities, "engine_exchangeCapabilities").await
    }
}
