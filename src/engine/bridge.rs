//! Consensus-side Engine API client.
//!
//! [`EngineBridge`] drives the four Engine API interactions the consensus
//! layer needs: submitting payloads, announcing fork choice, retrieving built
//! payloads and negotiating capabilities. Every call runs under a per-call
//! deadline and the caller's [`CallContext`], records its duration and maps
//! failures onto [`EngineError`]. Calls are never retried.
//!
//! Every classified failure is logged once, at error level, when it leaves
//! the bridge. `NotReady` outcomes and caller cancellation are expected and
//! only logged at debug level.

use super::{
    capabilities::{CapabilityRegistry, CapabilitySet},
    config::EngineClientConfig,
    context::{CallContext, Deadline},
    error::{EngineError, ProtocolViolation, TransportResult},
    fork::{EngineFork, EngineMethod},
    metrics::{EngineMetrics, EngineOperation},
    status::process_payload_status,
    transport::EngineTransport,
    types::{
        BuiltPayload, ForkchoiceState, NewPayloadRequest, PayloadAttributes, PayloadId,
        PayloadStatusResult,
    },
};
use alloy_primitives::B256;
use reth_tracing::tracing::{debug, error, info, warn};
use std::{future::Future, sync::Arc};
use tokio::time::Instant;

/// Bridge between the consensus layer and an execution client.
#[derive(Debug)]
pub struct EngineBridge<T> {
    config: EngineClientConfig,
    transport: T,
    capabilities: CapabilityRegistry,
    metrics: EngineMetrics,
}

impl<T: EngineTransport> EngineBridge<T> {
    /// Create a bridge with metrics registered on the global recorder.
    pub fn new(config: EngineClientConfig, transport: T) -> Self {
        Self::with_metrics(config, transport, EngineMetrics::new())
    }

    /// Create a bridge with the given metric handles.
    pub fn with_metrics(config: EngineClientConfig, transport: T, metrics: EngineMetrics) -> Self {
        Self { config, transport, capabilities: CapabilityRegistry::new(), metrics }
    }

    /// Submit an execution payload for validation.
    ///
    /// Returns the latest valid hash reported for a `VALID` payload.
    pub async fn new_payload(
        &self,
        ctx: &CallContext,
        request: &NewPayloadRequest,
    ) -> Result<B256, EngineError> {
        self.submit_payload(ctx, request)
            .await
            .inspect_err(|err| log_failure(EngineOperation::NewPayload, err))
    }

    /// Announce the fork-choice head, optionally starting a payload build.
    ///
    /// Returns the payload id when a build was requested and started.
    pub async fn forkchoice_updated(
        &self,
        ctx: &CallContext,
        state: &ForkchoiceState,
        attributes: Option<&PayloadAttributes>,
        fork: EngineFork,
    ) -> Result<Option<PayloadId>, EngineError> {
        self.notify_forkchoice(ctx, state, attributes, fork)
            .await
            .inspect_err(|err| log_failure(EngineOperation::ForkchoiceUpdated, err))
    }

    /// Retrieve a payload built after a fork-choice update with attributes.
    pub async fn get_payload(
        &self,
        ctx: &CallContext,
        payload_id: PayloadId,
        fork: EngineFork,
    ) -> Result<BuiltPayload, EngineError> {
        self.retrieve_payload(ctx, payload_id, fork)
            .await
            .inspect_err(|err| log_failure(EngineOperation::GetPayload, err))
    }

    /// Negotiate capabilities with the execution client.
    ///
    /// The resulting set replaces the previous one entirely.
    pub async fn exchange_capabilities(
        &self,
        ctx: &CallContext,
    ) -> Result<Arc<CapabilitySet>, EngineError> {
        self.negotiate_capabilities(ctx)
            .await
            .inspect_err(|err| log_failure(EngineOperation::ExchangeCapabilities, err))
    }

    /// Current capability snapshot, empty before the first negotiation.
    pub fn capabilities(&self) -> Arc<CapabilitySet> {
        self.capabilities.snapshot()
    }

    /// Whether the last negotiation found `capability` on the execution client.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.has(capability)
    }

    /// Bridge configuration.
    pub fn config(&self) -> &EngineClientConfig {
        &self.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn submit_payload(
        &self,
        ctx: &CallContext,
        request: &NewPayloadRequest,
    ) -> Result<B256, EngineError> {
        let method = request.fork.new_payload();
        self.check_advertised(method);

        let status = self
            .call(ctx, EngineOperation::NewPayload, self.transport.new_payload(request))
            .await?
            .ok_or(ProtocolViolation::NilPayloadStatus)?;
        log_validation_error(method, request.block_hash(), &status);

        process_payload_status(&status)
    }

    async fn notify_forkchoice(
        &self,
        ctx: &CallContext,
        state: &ForkchoiceState,
        attributes: Option<&PayloadAttributes>,
        fork: EngineFork,
    ) -> Result<Option<PayloadId>, EngineError> {
        let method = fork.forkchoice_updated();
        self.check_advertised(method);

        if attributes.is_some_and(|attributes| attributes.suggested_fee_recipient.is_zero()) {
            warn!(
                target: "engine::bridge",
                head = %state.head_block_hash,
                "Suggested fee recipient is not configured, block rewards will be burned"
            );
        }

        let response = self
            .call(
                ctx,
                EngineOperation::ForkchoiceUpdated,
                self.transport.forkchoice_updated(state, attributes, fork),
            )
            .await?
            .ok_or(ProtocolViolation::NilForkchoiceResponse)?;
        let status = response.payload_status.ok_or(ProtocolViolation::NilPayloadStatus)?;
        log_validation_error(method, state.head_block_hash, &status);

        process_payload_status(&status)?;
        Ok(response.payload_id)
    }

    async fn retrieve_payload(
        &self,
        ctx: &CallContext,
        payload_id: PayloadId,
        fork: EngineFork,
    ) -> Result<BuiltPayload, EngineError> {
        self.check_advertised(fork.get_payload());

        let envelope = self
            .call(ctx, EngineOperation::GetPayload, self.transport.get_payload(payload_id, fork))
            .await?
            .ok_or(ProtocolViolation::NilExecutionPayloadEnvelope)?;
        let built = BuiltPayload::try_from(envelope)?;

        debug!(
            target: "engine::bridge",
            %payload_id,
            block_hash = %built.block_hash(),
            blobs = built.blobs_bundle.blob_count(),
            block_value = %built.block_value,
            "Retrieved built payload"
        );
        Ok(built)
    }

    async fn negotiate_capabilities(
        &self,
        ctx: &CallContext,
    ) -> Result<Arc<CapabilitySet>, EngineError> {
        let local = &self.config.capabilities;
        let remote = self
            .call(
                ctx,
                EngineOperation::ExchangeCapabilities,
                self.transport.exchange_capabilities(local),
            )
            .await?;

        for capability in &remote {
            info!(target: "engine::bridge", %capability, "Exchanged capability");
        }

        let set = self.capabilities.replace(CapabilitySet::from_exchange(local, &remote));
        for capability in set.missing() {
            warn!(
                target: "engine::bridge",
                unsupported_capability = %capability,
                "Execution client does not support capability, it may require an update"
            );
        }
        Ok(set)
    }

    /// Run a transport call under the operation's deadline and classify the
    /// outcome.
    async fn call<R, F>(
        &self,
        ctx: &CallContext,
        operation: EngineOperation,
        fut: F,
    ) -> Result<R, EngineError>
    where
        F: Future<Output = TransportResult<R>>,
    {
        let timeout = self.config.timeout(operation);
        let started = Instant::now();
        let result = ctx.run(Deadline::after(timeout), fut).await;
        self.metrics.record_duration(operation, started.elapsed());

        result.map_err(|err| {
            if err.is_timeout() {
                self.metrics.increment_timeout(operation);
            }
            EngineError::classify(operation, timeout, err)
        })
    }

    fn check_advertised(&self, method: EngineMethod) {
        let snapshot = self.capabilities.snapshot();
        if !snapshot.is_empty() && !snapshot.supports_method(method) {
            debug!(
                target: "engine::bridge",
                %method,
                "Method was not advertised by the execution client"
            );
        }
    }
}

fn log_failure(operation: EngineOperation, err: &EngineError) {
    if err.is_cancelled() {
        debug!(target: "engine::bridge", %operation, "Engine call cancelled");
    } else if err.is_not_ready() {
        debug!(target: "engine::bridge", %operation, %err, "Execution client not ready");
    } else {
        error!(
            target: "engine::bridge",
            %operation,
            kind = %err.kind(),
            %err,
            "Engine call failed"
        );
    }
}

fn log_validation_error(method: EngineMethod, block_hash: B256, status: &PayloadStatusResult) {
    if let Some(validation_error) = &status.validation_error {
        error!(
            target: "engine::bridge",
            %method,
            %block_hash,
            status = %status.status,
            latest_valid_hash = ?status.latest_valid_hash,
            %validation_error,
            "Execution client reported a validation error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        error::{EngineApiErrorCode, EngineErrorKind, TransportError},
        metrics::{recorded_by_method, METRIC_REQUEST_DURATION, METRIC_TIMEOUTS},
        test_utils::{
            sample_envelope, sample_new_payload_request, MockEngineTransport, MockRequest,
        },
        types::{BlobsBundle, ForkchoiceUpdated, PayloadStatusKind},
    };
    use alloy_primitives::Address;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use std::{collections::HashMap, time::Duration};
    use tracing_test::traced_test;

    fn bridge(transport: MockEngineTransport) -> EngineBridge<MockEngineTransport> {
        EngineBridge::new(EngineClientConfig::default(), transport)
    }

    fn recorded_bridge(
        transport: MockEngineTransport,
    ) -> (EngineBridge<MockEngineTransport>, Snapshotter) {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let bridge = metrics::with_local_recorder(&recorder, || bridge(transport));
        (bridge, snapshotter)
    }

    fn metric<'a>(
        recorded: &'a HashMap<(String, String), DebugValue>,
        name: &str,
        method: &str,
    ) -> Option<&'a DebugValue> {
        recorded.get(&(name.to_owned(), method.to_owned()))
    }

    fn forkchoice_state() -> ForkchoiceState {
        ForkchoiceState {
            head_block_hash: B256::repeat_byte(0x06),
            safe_block_hash: B256::repeat_byte(0x01),
            finalized_block_hash: B256::repeat_byte(0x01),
        }
    }

    fn attributes(fee_recipient: Address) -> PayloadAttributes {
        PayloadAttributes {
            timestamp: 1_700_000_012,
            prev_randao: B256::repeat_byte(0x09),
            suggested_fee_recipient: fee_recipient,
            withdrawals: Some(vec![]),
            parent_beacon_block_root: Some(B256::repeat_byte(0x07)),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn count_lines(lines: &[&str], level: &str, message: &str) -> usize {
        lines.iter().filter(|line| line.contains(level) && line.contains(message)).count()
    }

    #[tokio::test]
    async fn test_submit_valid_payload() {
        let hash = B256::repeat_byte(0x06);
        let bridge = bridge(
            MockEngineTransport::new().with_new_payload(Ok(Some(PayloadStatusResult::valid(hash)))),
        );
        let request = sample_new_payload_request(EngineFork::Cancun);

        let result = bridge.new_payload(&CallContext::new(), &request).await;

        assert_eq!(result, Ok(hash));
        assert_eq!(bridge.transport().requests(), vec![MockRequest::NewPayload(request)]);
    }

    #[tokio::test]
    async fn test_submit_invalid_payload_forwards_latest_valid_hash() {
        let ancestor = B256::repeat_byte(0x01);
        let status = PayloadStatusResult::new(PayloadStatusKind::Invalid)
            .with_latest_valid_hash(ancestor)
            .with_validation_error("bad state root");
        let bridge = bridge(MockEngineTransport::new().with_new_payload(Ok(Some(status))));

        let err = bridge
            .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Prague))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::RejectedPayload {
                latest_valid_hash: Some(ancestor),
                validation_error: Some("bad state root".into()),
            }
        );
        assert_eq!(err.latest_valid_hash(), Some(ancestor));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_validation_error_on_valid_status_is_diagnostic() {
        let hash = B256::repeat_byte(0x06);
        let status = PayloadStatusResult::valid(hash).with_validation_error("slow trie");
        let bridge = bridge(MockEngineTransport::new().with_new_payload(Ok(Some(status))));

        let result = bridge
            .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Cancun))
            .await;

        assert_eq!(result, Ok(hash));
        assert!(logs_contain("reported a validation error"));
        assert!(logs_contain("slow trie"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_submit_not_ready() {
        for status in [PayloadStatusResult::syncing(), PayloadStatusResult::accepted()] {
            let kind = status.status.clone();
            let bridge = bridge(MockEngineTransport::new().with_new_payload(Ok(Some(status))));

            let err = bridge
                .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Cancun))
                .await
                .unwrap_err();

            assert_eq!(err, EngineError::NotReady(kind));
            assert!(err.is_not_ready());
        }
        logs_assert(|lines: &[&str]| match count_lines(lines, "ERROR", "Engine call failed") {
            0 => Ok(()),
            n => Err(format!("not-ready outcomes must not log errors, got {n}")),
        });
    }

    #[tokio::test]
    async fn test_unknown_status_is_protocol_violation() {
        let status = PayloadStatusResult::new(PayloadStatusKind::Unknown("PENDING".into()));
        let bridge = bridge(MockEngineTransport::new().with_new_payload(Ok(Some(status))));

        let err = bridge
            .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::ProtocolViolation(ProtocolViolation::UnknownPayloadStatus(
                "PENDING".into()
            ))
        );
    }

    #[tokio::test]
    async fn test_nil_responses_are_protocol_violations() {
        let bridge = bridge(
            MockEngineTransport::new()
                .with_new_payload(Ok(None))
                .with_forkchoice_updated(Ok(None))
                .with_get_payload(Ok(None)),
        );
        let ctx = CallContext::new();

        let submit = bridge
            .new_payload(&ctx, &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();
        let notify = bridge
            .forkchoice_updated(&ctx, &forkchoice_state(), None, EngineFork::Cancun)
            .await
            .unwrap_err();
        let retrieve = bridge
            .get_payload(&ctx, PayloadId::new([1; 8]), EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(submit, EngineError::ProtocolViolation(ProtocolViolation::NilPayloadStatus));
        assert_eq!(
            notify,
            EngineError::ProtocolViolation(ProtocolViolation::NilForkchoiceResponse)
        );
        assert_eq!(
            retrieve,
            EngineError::ProtocolViolation(ProtocolViolation::NilExecutionPayloadEnvelope)
        );
        for err in [submit, notify, retrieve] {
            assert_eq!(err.kind(), EngineErrorKind::ProtocolViolation);
        }
    }

    #[tokio::test]
    async fn test_forkchoice_without_payload_status() {
        let response = ForkchoiceUpdated { payload_status: None, payload_id: None };
        let bridge =
            bridge(MockEngineTransport::new().with_forkchoice_updated(Ok(Some(response))));

        let err = bridge
            .forkchoice_updated(&CallContext::new(), &forkchoice_state(), None, EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::ProtocolViolation(ProtocolViolation::NilPayloadStatus));
        assert!(err.is_definitive());
        assert!(!err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_forkchoice_with_statusless_payload_status() {
        let payload_status: PayloadStatusResult =
            serde_json::from_str(r#"{"latestValidHash": null}"#).unwrap();
        let bridge = bridge(
            MockEngineTransport::new()
                .with_forkchoice_updated(Ok(Some(ForkchoiceUpdated::new(payload_status)))),
        );

        let err = bridge
            .forkchoice_updated(&CallContext::new(), &forkchoice_state(), None, EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::ProtocolViolation(ProtocolViolation::UnknownPayloadStatus(String::new()))
        );
        assert_eq!(err.kind(), EngineErrorKind::ProtocolViolation);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_zero_fee_recipient_warns_and_proceeds() {
        let payload_id = PayloadId::new([7; 8]);
        let response = ForkchoiceUpdated::new(PayloadStatusResult::valid(B256::repeat_byte(0x06)))
            .with_payload_id(payload_id);
        let bridge =
            bridge(MockEngineTransport::new().with_forkchoice_updated(Ok(Some(response))));
        let attributes = attributes(Address::ZERO);

        let result = bridge
            .forkchoice_updated(
                &CallContext::new(),
                &forkchoice_state(),
                Some(&attributes),
                EngineFork::Prague,
            )
            .await;

        assert_eq!(result, Ok(Some(payload_id)));
        assert!(logs_contain("fee recipient is not configured"));
        assert_eq!(
            bridge.transport().requests(),
            vec![MockRequest::ForkchoiceUpdated {
                state: forkchoice_state(),
                attributes: Some(attributes),
                fork: EngineFork::Prague,
            }]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_configured_fee_recipient_does_not_warn() {
        let response = ForkchoiceUpdated::new(PayloadStatusResult::valid(B256::repeat_byte(0x06)));
        let bridge =
            bridge(MockEngineTransport::new().with_forkchoice_updated(Ok(Some(response))));

        let result = bridge
            .forkchoice_updated(
                &CallContext::new(),
                &forkchoice_state(),
                Some(&attributes(Address::repeat_byte(0x42))),
                EngineFork::Cancun,
            )
            .await;

        assert_eq!(result, Ok(None));
        assert!(!logs_contain("fee recipient is not configured"));
    }

    #[tokio::test]
    async fn test_forkchoice_syncing_withholds_payload_id() {
        let response = ForkchoiceUpdated::new(PayloadStatusResult::syncing())
            .with_payload_id(PayloadId::new([3; 8]));
        let bridge =
            bridge(MockEngineTransport::new().with_forkchoice_updated(Ok(Some(response))));

        let err = bridge
            .forkchoice_updated(&CallContext::new(), &forkchoice_state(), None, EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::NotReady(PayloadStatusKind::Syncing));
    }

    #[tokio::test]
    async fn test_get_payload_without_blobs_bundle() {
        let mut envelope = sample_envelope(EngineFork::Cancun);
        envelope.blobs_bundle = None;
        let bridge = bridge(MockEngineTransport::new().with_get_payload(Ok(Some(envelope))));

        let err = bridge
            .get_payload(&CallContext::new(), PayloadId::new([1; 8]), EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::ProtocolViolation(ProtocolViolation::NilBlobsBundle));
        assert_ne!(
            err,
            EngineError::ProtocolViolation(ProtocolViolation::NilExecutionPayloadEnvelope)
        );
    }

    #[tokio::test]
    async fn test_get_payload_osaka() {
        let envelope = sample_envelope(EngineFork::Osaka);
        let bridge =
            bridge(MockEngineTransport::new().with_get_payload(Ok(Some(envelope.clone()))));
        let payload_id = PayloadId::new([2; 8]);

        let built = bridge
            .get_payload(&CallContext::new(), payload_id, EngineFork::Osaka)
            .await
            .unwrap();

        assert_eq!(built.fork, EngineFork::Osaka);
        assert!(matches!(built.blobs_bundle, BlobsBundle::V2(_)));
        assert_eq!(
            built.block_hash(),
            envelope.execution_payload.payload_inner.payload_inner.block_hash
        );
        assert_eq!(
            bridge.transport().requests(),
            vec![MockRequest::GetPayload { payload_id, fork: EngineFork::Osaka }]
        );
    }

    #[tokio::test]
    async fn test_remote_error_is_forwarded_verbatim() {
        let bridge = bridge(MockEngineTransport::new().with_get_payload(Err(TransportError::Rpc {
            code: -38001,
            message: "Unknown payload".into(),
            data: None,
        })));

        let err = bridge
            .get_payload(&CallContext::new(), PayloadId::new([1; 8]), EngineFork::Prague)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::RemoteRejected {
                operation: EngineOperation::GetPayload,
                code: -38001,
                message: "Unknown payload".into(),
                data: None,
            }
        );
        assert_eq!(err.remote_code(), Some(EngineApiErrorCode::UnknownPayload));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_failure() {
        let bridge = bridge(
            MockEngineTransport::new()
                .with_new_payload(Err(TransportError::Connection("connection refused".into()))),
        );

        let err = bridge
            .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::TransportFailure);
        assert!(err.is_infrastructure());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_classified_failures_are_logged_at_error_level() {
        let bridge = bridge(
            MockEngineTransport::new()
                .with_new_payload(Err(TransportError::Connection("connection refused".into())))
                .with_get_payload(Ok(None)),
        );
        let ctx = CallContext::new();

        bridge
            .new_payload(&ctx, &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();
        bridge.get_payload(&ctx, PayloadId::new([1; 8]), EngineFork::Cancun).await.unwrap_err();

        assert!(logs_contain("kind=TransportFailure"));
        assert!(logs_contain("kind=ProtocolViolation"));
        logs_assert(|lines: &[&str]| match count_lines(lines, "ERROR", "Engine call failed") {
            2 => Ok(()),
            n => Err(format!("expected 2 error lines for 2 failures, got {n}")),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_timeout_counts_once() {
        let (bridge, snapshotter) = recorded_bridge(
            MockEngineTransport::new()
                .with_new_payload(Ok(Some(PayloadStatusResult::valid(B256::ZERO))))
                .with_latency(Duration::from_secs(10)),
        );

        let err = bridge
            .new_payload(&CallContext::new(), &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::Timeout {
                operation: EngineOperation::NewPayload,
                timeout: bridge.config().new_payload_timeout,
                source: TransportError::DeadlineExceeded,
            }
        );
        let recorded = recorded_by_method(&snapshotter);
        assert_eq!(
            metric(&recorded, METRIC_TIMEOUTS, "new_payload"),
            Some(&DebugValue::Counter(1))
        );
        assert_eq!(
            metric(&recorded, METRIC_TIMEOUTS, "get_payload"),
            Some(&DebugValue::Counter(0))
        );
        match metric(&recorded, METRIC_REQUEST_DURATION, "new_payload") {
            Some(DebugValue::Histogram(samples)) => assert_eq!(samples.len(), 1),
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_payload_uses_its_own_deadline() {
        let (bridge, snapshotter) = recorded_bridge(
            MockEngineTransport::new()
                .with_get_payload(Ok(Some(sample_envelope(EngineFork::Cancun))))
                .with_latency(Duration::from_secs(2)),
        );

        let err = bridge
            .get_payload(&CallContext::new(), PayloadId::new([1; 8]), EngineFork::Cancun)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::Timeout);
        let recorded = recorded_by_method(&snapshotter);
        assert_eq!(
            metric(&recorded, METRIC_TIMEOUTS, "get_payload"),
            Some(&DebugValue::Counter(1))
        );
        assert_eq!(
            metric(&recorded, METRIC_TIMEOUTS, "new_payload"),
            Some(&DebugValue::Counter(0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_is_not_a_timeout() {
        let (bridge, snapshotter) = recorded_bridge(
            MockEngineTransport::new()
                .with_new_payload(Ok(Some(PayloadStatusResult::valid(B256::ZERO))))
                .with_latency(Duration::from_secs(5)),
        );
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = bridge
            .new_payload(&ctx, &sample_new_payload_request(EngineFork::Cancun))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(
            err,
            EngineError::TransportFailure {
                operation: EngineOperation::NewPayload,
                source: TransportError::Cancelled,
            }
        );
        let recorded = recorded_by_method(&snapshotter);
        assert_eq!(
            metric(&recorded, METRIC_TIMEOUTS, "new_payload"),
            Some(&DebugValue::Counter(0))
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_negotiation_marks_missing_capabilities() {
        let config = EngineClientConfig::default().with_capabilities(["A", "B"]);
        let bridge = EngineBridge::new(
            config,
            MockEngineTransport::new().with_exchange_capabilities(Ok(names(&["A"]))),
        );

        let set = bridge.exchange_capabilities(&CallContext::new()).await.unwrap();

        assert_eq!(set.get("A"), Some(true));
        assert_eq!(set.get("B"), Some(false));
        assert!(bridge.has_capability("A"));
        assert!(!bridge.has_capability("B"));
        assert_eq!(
            bridge.transport().requests(),
            vec![MockRequest::ExchangeCapabilities(names(&["A", "B"]))]
        );
        assert!(logs_contain("Exchanged capability"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("unsupported_capability")).count() {
                1 => Ok(()),
                n => Err(format!("expected one unsupported capability warning, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_renegotiation_replaces_registry() {
        let config = EngineClientConfig::default().with_capabilities(["A", "B"]);
        let bridge = EngineBridge::new(
            config,
            MockEngineTransport::new().with_exchange_capabilities(Ok(names(&["A", "Z"]))),
        );
        let ctx = CallContext::new();

        let first = bridge.exchange_capabilities(&ctx).await.unwrap();
        bridge.transport().set_exchange_capabilities(Ok(names(&["B"])));
        let second = bridge.exchange_capabilities(&ctx).await.unwrap();

        assert_eq!(second.get("A"), Some(false));
        assert_eq!(second.get("B"), Some(true));
        assert_eq!(second.get("Z"), None);
        assert_eq!(bridge.capabilities(), second);
        assert_eq!(first.get("Z"), Some(true));
    }

    #[tokio::test]
    async fn test_failed_negotiation_keeps_previous_snapshot() {
        let bridge = bridge(
            MockEngineTransport::new()
                .with_exchange_capabilities(Ok(names(&["engine_newPayloadV3"]))),
        );
        let ctx = CallContext::new();
        bridge.exchange_capabilities(&ctx).await.unwrap();

        bridge
            .transport()
            .set_exchange_capabilities(Err(TransportError::Connection("reset".into())));
        let err = bridge.exchange_capabilities(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), EngineErrorKind::TransportFailure);
        assert!(bridge.has_capability("engine_newPayloadV3"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unadvertised_method_is_only_a_hint() {
        let hash = B256::repeat_byte(0x06);
        let bridge = bridge(
            MockEngineTransport::new()
                .with_exchange_capabilities(Ok(names(&["engine_newPayloadV3"])))
                .with_new_payload(Ok(Some(PayloadStatusResult::valid(hash)))),
        );
        let ctx = CallContext::new();
        bridge.exchange_capabilities(&ctx).await.unwrap();

        let result =
            bridge.new_payload(&ctx, &sample_new_payload_request(EngineFork::Prague)).await;

        assert_eq!(result, Ok(hash));
        assert!(logs_contain("Method was not advertised"));
        assert!(logs_contain("engine_newPayloadV4"));
    }
}
