//! Engine API request and response types used by the bridge.
//!
//! Request-side types come straight from `alloy_rpc_types_engine`. Response
//! types are decoded into bridge-owned shapes so that *absent* fields (a
//! `null` result, a missing blobs bundle, an unrecognised status string)
//! survive decoding and can be classified by the bridge instead of failing
//! deep inside the transport.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  engine_getPayloadV{3,4,5}                                          │
//! │                                                                     │
//! │  ExecutionPayloadEnvelope          (decoded, fields optional)       │
//! │    ├── execution_payload: ExecutionPayloadV3                        │
//! │    ├── blobs_bundle: Option<BlobsBundle>                            │
//! │    └── execution_requests: Option<Requests>                         │
//! │                │                                                    │
//! │                │ TryFrom (NilBlobsBundle on None)                   │
//! │                ▼                                                    │
//! │  BuiltPayload                      (validated, returned to caller)  │
//! │    └── blobs_bundle: BlobsBundle                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use super::{error::ProtocolViolation, fork::EngineFork};
use alloy_eips::eip7685::Requests;
use alloy_primitives::{B256, U256};
use alloy_rpc_types_engine::{BlobsBundleV1, BlobsBundleV2, ExecutionPayloadV3};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use alloy_rpc_types_engine::{ForkchoiceState, PayloadAttributes, PayloadId};

// ============================================================================
// Payload status
// ============================================================================

/// Status reported by the execution engine for a payload or fork-choice update.
///
/// Decoded from the wire string; unrecognised values are kept verbatim in
/// [`PayloadStatusKind::Unknown`]. An absent or `null` status decodes to an
/// empty `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PayloadStatusKind {
    /// `VALID`
    Valid,
    /// `INVALID`
    Invalid,
    /// `INVALID_BLOCK_HASH`, still emitted by some clients.
    InvalidBlockHash,
    /// `SYNCING`
    Syncing,
    /// `ACCEPTED`
    Accepted,
    /// Anything else.
    Unknown(String),
}

impl PayloadStatusKind {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::InvalidBlockHash => "INVALID_BLOCK_HASH",
            Self::Syncing => "SYNCING",
            Self::Accepted => "ACCEPTED",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for PayloadStatusKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "VALID" => Self::Valid,
            "INVALID" => Self::Invalid,
            "INVALID_BLOCK_HASH" => Self::InvalidBlockHash,
            "SYNCING" => Self::Syncing,
            "ACCEPTED" => Self::Accepted,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<PayloadStatusKind> for String {
    fn from(kind: PayloadStatusKind) -> Self {
        match kind {
            PayloadStatusKind::Unknown(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl Default for PayloadStatusKind {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<PayloadStatusKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(Into::into).unwrap_or_default())
}

impl fmt::Display for PayloadStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload status object (`PayloadStatusV1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatusResult {
    /// Reported status.
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: PayloadStatusKind,
    /// Most recent valid ancestor known to the engine.
    #[serde(default)]
    pub latest_valid_hash: Option<B256>,
    /// Diagnostic message; may accompany any status.
    #[serde(default)]
    pub validation_error: Option<String>,
}

impl PayloadStatusResult {
    /// Create a status without hash or message.
    pub fn new(status: PayloadStatusKind) -> Self {
        Self { status, latest_valid_hash: None, validation_error: None }
    }

    /// `VALID` with the given latest valid hash.
    pub fn valid(latest_valid_hash: B256) -> Self {
        Self::new(PayloadStatusKind::Valid).with_latest_valid_hash(latest_valid_hash)
    }

    /// `SYNCING`.
    pub fn syncing() -> Self {
        Self::new(PayloadStatusKind::Syncing)
    }

    /// `ACCEPTED`.
    pub fn accepted() -> Self {
        Self::new(PayloadStatusKind::Accepted)
    }

    /// Set the latest valid hash.
    pub fn with_latest_valid_hash(mut self, hash: B256) -> Self {
        self.latest_valid_hash = Some(hash);
        self
    }

    /// Set the validation error message.
    pub fn with_validation_error(mut self, message: impl Into<String>) -> Self {
        self.validation_error = Some(message.into());
        self
    }
}

/// Result of `engine_forkchoiceUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdated {
    /// Status of the new head, `None` if the engine omitted it.
    #[serde(default)]
    pub payload_status: Option<PayloadStatusResult>,
    /// Build job identifier, present only if attributes were supplied.
    #[serde(default)]
    pub payload_id: Option<PayloadId>,
}

impl ForkchoiceUpdated {
    /// Create a response without a payload id.
    pub fn new(payload_status: PayloadStatusResult) -> Self {
        Self { payload_status: Some(payload_status), payload_id: None }
    }

    /// Attach a payload id.
    pub fn with_payload_id(mut self, payload_id: PayloadId) -> Self {
        self.payload_id = Some(payload_id);
        self
    }
}

// ============================================================================
// newPayload request
// ============================================================================

/// Arguments of `engine_newPayloadV{3,4}`.
///
/// `execution_requests` is only put on the wire for forks that carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayloadRequest {
    /// Fork selecting the method version.
    pub fork: EngineFork,
    /// The execution payload.
    pub payload: ExecutionPayloadV3,
    /// Versioned hashes of the blobs referenced by the payload.
    pub versioned_hashes: Vec<B256>,
    /// EIP-4788 parent beacon block root.
    pub parent_beacon_block_root: B256,
    /// EIP-7685 execution layer requests.
    pub execution_requests: Requests,
}

impl NewPayloadRequest {
    /// Create a request with no execution requests.
    pub fn new(
        fork: EngineFork,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Self {
        Self {
            fork,
            payload,
            versioned_hashes,
            parent_beacon_block_root,
            execution_requests: Requests::default(),
        }
    }

    /// Set the execution requests.
    pub fn with_execution_requests(mut self, requests: Requests) -> Self {
        self.execution_requests = requests;
        self
    }

    /// Hash of the submitted execution block.
    pub fn block_hash(&self) -> B256 {
        self.payload.payload_inner.payload_inner.block_hash
    }

    /// Number of the submitted execution block.
    pub fn block_number(&self) -> u64 {
        self.payload.payload_inner.payload_inner.block_number
    }
}

// ============================================================================
// getPayload response
// ============================================================================

/// Blobs bundle, versioned by fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobsBundle {
    /// EIP-4844 bundle (getPayloadV3/V4).
    V1(BlobsBundleV1),
    /// EIP-7594 bundle with cell proofs (getPayloadV5).
    V2(BlobsBundleV2),
}

impl BlobsBundle {
    /// Number of blobs in the bundle.
    pub fn blob_count(&self) -> usize {
        match self {
            Self::V1(bundle) => bundle.blobs.len(),
            Self::V2(bundle) => bundle.blobs.len(),
        }
    }
}

/// `getPayload` response as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPayloadEnvelope {
    /// Fork the envelope was requested for.
    pub fork: EngineFork,
    /// The built execution payload.
    pub execution_payload: ExecutionPayloadV3,
    /// Value of the block to the fee recipient, in wei.
    pub block_value: U256,
    /// Blobs bundle; absent only if the engine misbehaved.
    pub blobs_bundle: Option<BlobsBundle>,
    /// Whether the engine suggests using an external builder instead.
    pub should_override_builder: bool,
    /// EIP-7685 requests (Prague onwards).
    pub execution_requests: Option<Requests>,
}

/// A built payload whose envelope passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPayload {
    /// Fork the payload was built for.
    pub fork: EngineFork,
    /// The built execution payload.
    pub execution_payload: ExecutionPayloadV3,
    /// Value of the block to the fee recipient, in wei.
    pub block_value: U256,
    /// Blobs bundle.
    pub blobs_bundle: BlobsBundle,
    /// Whether the engine suggests using an external builder instead.
    pub should_override_builder: bool,
    /// EIP-7685 requests, empty before Prague.
    pub execution_requests: Requests,
}

impl BuiltPayload {
    /// Hash of the built execution block.
    pub fn block_hash(&self) -> B256 {
        self.execution_payload.payload_inner.payload_inner.block_hash
    }
}

impl TryFrom<ExecutionPayloadEnvelope> for BuiltPayload {
    type Error = ProtocolViolation;

    fn try_from(envelope: ExecutionPayloadEnvelope) -> Result<Self, Self::Error> {
        let blobs_bundle = envelope.blobs_bundle.ok_or(ProtocolViolation::NilBlobsBundle)?;
        Ok(Self {
            fork: envelope.fork,
            execution_payload: envelope.execution_payload,
            block_value: envelope.block_value,
            blobs_bundle,
            should_override_builder: envelope.should_override_builder,
            execution_requests: envelope.execution_requests.unwrap_or_default(),
        })
    }
}
