//! Payload status processing.

use super::{
    error::{EngineError, ProtocolViolation},
    types::{PayloadStatusKind, PayloadStatusResult},
};
use alloy_primitives::B256;

/// Turn a reported payload status into the caller-facing outcome.
///
/// Only the `status` field decides the outcome; `validation_error` is
/// forwarded for diagnostics but never turns a success into a failure.
pub fn process_payload_status(result: &PayloadStatusResult) -> Result<B256, EngineError> {
    match &result.status {
        PayloadStatusKind::Valid => result
            .latest_valid_hash
            .ok_or(EngineError::ProtocolViolation(ProtocolViolation::MissingLatestValidHash)),
        PayloadStatusKind::Invalid | PayloadStatusKind::InvalidBlockHash => {
            Err(EngineError::RejectedPayload {
                latest_valid_hash: result.latest_valid_hash,
                validation_error: result.validation_error.clone(),
            })
        }
        status @ (PayloadStatusKind::Syncing | PayloadStatusKind::Accepted) => {
            Err(EngineError::NotReady(status.clone()))
        }
        PayloadStatusKind::Unknown(raw) => {
            Err(ProtocolViolation::UnknownPayloadStatus(raw.clone()).into())
        }
    }
}
