//! Engine bridge error types.
//!
//! Every failure surfaced by the bridge is an [`EngineError`] whose
//! [`EngineErrorKind`] is one of six stable kinds. Raw transport failures are
//! [`TransportError`]s and are converted by [`EngineError::classify`].

use super::{metrics::EngineOperation, types::PayloadStatusKind};
use alloy_primitives::B256;
use std::{fmt, time::Duration};

/// Raw failures reported by an [`EngineTransport`](super::EngineTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport's own request timeout fired.
    #[error("request timed out")]
    Timeout,
    /// The bridge's per-call deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The caller cancelled the call.
    #[error("call cancelled by caller")]
    Cancelled,
    /// The engine answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i32,
        /// Error message.
        message: String,
        /// Raw `data` member, if any.
        data: Option<String>,
    },
    /// The connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),
    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Any other client failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether this failure is a deadline breach.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::DeadlineExceeded)
    }
}

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Response shapes that violate the Engine API contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// `newPayload` returned `null`.
    #[error("nil payload status")]
    NilPayloadStatus,
    /// `forkchoiceUpdated` returned `null`.
    #[error("nil forkchoice response")]
    NilForkchoiceResponse,
    /// `getPayload` returned `null`.
    #[error("nil execution payload envelope")]
    NilExecutionPayloadEnvelope,
    /// `getPayload` returned an envelope without a blobs bundle.
    #[error("nil blobs bundle")]
    NilBlobsBundle,
    /// `VALID` status without a latest valid hash.
    #[error("valid payload status without latest valid hash")]
    MissingLatestValidHash,
    /// Status string outside the Engine API vocabulary.
    #[error("unknown payload status: {0}")]
    UnknownPayloadStatus(String),
}

/// Well-known JSON-RPC and Engine API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineApiErrorCode {
    /// `-32700`
    ParseError,
    /// `-32600`
    InvalidRequest,
    /// `-32601`
    MethodNotFound,
    /// `-32602`
    InvalidParams,
    /// `-32603`
    InternalError,
    /// `-32000`
    ServerError,
    /// `-38001`
    UnknownPayload,
    /// `-38002`
    InvalidForkchoiceState,
    /// `-38003`
    InvalidPayloadAttributes,
    /// `-38004`
    RequestTooLarge,
    /// `-38005`
    UnsupportedFork,
}

impl EngineApiErrorCode {
    /// Interpret a raw error code.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -38001 => Self::UnknownPayload,
            -38002 => Self::InvalidForkchoiceState,
            -38003 => Self::InvalidPayloadAttributes,
            -38004 => Self::RequestTooLarge,
            -38005 => Self::UnsupportedFork,
            _ => return None,
        })
    }

    /// Raw error code.
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::UnknownPayload => -38001,
            Self::InvalidForkchoiceState => -38002,
            Self::InvalidPayloadAttributes => -38003,
            Self::RequestTooLarge => -38004,
            Self::UnsupportedFork => -38005,
        }
    }
}

/// Stable error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// A deadline elapsed.
    Timeout,
    /// The engine returned a JSON-RPC error.
    RemoteRejected,
    /// The response shape broke the protocol.
    ProtocolViolation,
    /// The payload is invalid.
    RejectedPayload,
    /// The engine cannot judge validity yet.
    NotReady,
    /// Any other transport failure.
    TransportFailure,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors returned by the [`EngineBridge`](super::EngineBridge).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The call did not complete before its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out.
        operation: EngineOperation,
        /// Configured timeout of the operation.
        timeout: Duration,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The engine rejected the request with a JSON-RPC error.
    #[error("{operation} rejected by execution client: code {code}, {message}")]
    RemoteRejected {
        /// Operation that was rejected.
        operation: EngineOperation,
        /// JSON-RPC error code, verbatim.
        code: i32,
        /// JSON-RPC error message, verbatim.
        message: String,
        /// JSON-RPC error data, verbatim.
        data: Option<String>,
    },

    /// The engine answered with a malformed response.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// The engine judged the payload invalid.
    #[error(
        "invalid payload status (latest valid hash: {latest_valid_hash:?}, \
         validation error: {validation_error:?})"
    )]
    RejectedPayload {
        /// Ancestor to roll back to, if reported.
        latest_valid_hash: Option<B256>,
        /// Validation message, if reported.
        validation_error: Option<String>,
    },

    /// The engine is syncing or only accepted the payload.
    #[error("execution client not ready: {0} payload status")]
    NotReady(PayloadStatusKind),

    /// Any other transport failure, including caller cancellation.
    #[error("{operation} transport failure: {source}")]
    TransportFailure {
        /// Operation that failed.
        operation: EngineOperation,
        /// Underlying transport failure.
        source: TransportError,
    },
}

impl EngineError {
    /// Map a transport failure of `operation` onto the taxonomy.
    ///
    /// Callers must increment the operation's timeout counter when
    /// [`TransportError::is_timeout`] holds, before classifying.
    pub fn classify(operation: EngineOperation, timeout: Duration, err: TransportError) -> Self {
        match err {
            err @ (TransportError::Timeout | TransportError::DeadlineExceeded) => {
                Self::Timeout { operation, timeout, source: err }
            }
            TransportError::Rpc { code, message, data } => {
                Self::RemoteRejected { operation, code, message, data }
            }
            source => Self::TransportFailure { operation, source },
        }
    }

    /// Kind of this error.
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            Self::Timeout { .. } => EngineErrorKind::Timeout,
            Self::RemoteRejected { .. } => EngineErrorKind::RemoteRejected,
            Self::ProtocolViolation(_) => EngineErrorKind::ProtocolViolation,
            Self::RejectedPayload { .. } => EngineErrorKind::RejectedPayload,
            Self::NotReady(_) => EngineErrorKind::NotReady,
            Self::TransportFailure { .. } => EngineErrorKind::TransportFailure,
        }
    }

    /// The call should be repeated later.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }

    /// The engine gave a final answer for this attempt.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self.kind(),
            EngineErrorKind::RejectedPayload
                | EngineErrorKind::ProtocolViolation
                | EngineErrorKind::RemoteRejected
        )
    }

    /// Infrastructure trouble that warrants alerting.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self.kind(), EngineErrorKind::Timeout | EngineErrorKind::TransportFailure)
    }

    /// Whether the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::TransportFailure { source: TransportError::Cancelled, .. })
    }

    /// Latest valid hash carried by a rejected payload.
    pub fn latest_valid_hash(&self) -> Option<B256> {
        match self {
            Self::RejectedPayload { latest_valid_hash, .. } => *latest_valid_hash,
            _ => None,
        }
    }

    /// Well-known meaning of a remote error code.
    pub fn remote_code(&self) -> Option<EngineApiErrorCode> {
        match self {
            Self::RemoteRejected { code, .. } => EngineApiErrorCode::from_code(*code),
            _ => None,
        }
    }
}
