//! Engine client configuration.

use super::{capabilities::supported_capabilities, metrics::EngineOperation};
use std::{path::PathBuf, time::Duration};

/// Default authenticated Engine API endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8551";

/// Default `engine_newPayload` timeout.
pub const DEFAULT_NEW_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(8);

/// Default `engine_forkchoiceUpdated` timeout.
pub const DEFAULT_FORKCHOICE_UPDATED_TIMEOUT: Duration = Duration::from_secs(8);

/// Default `engine_getPayload` timeout.
pub const DEFAULT_GET_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(1);

/// Default `engine_exchangeCapabilities` timeout.
pub const DEFAULT_EXCHANGE_CAPABILITIES_TIMEOUT: Duration = Duration::from_secs(1);

/// Engine client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineClientConfig {
    /// Authenticated Engine API URL.
    pub rpc_url: String,

    /// Path of the hex-encoded JWT secret shared with the execution client.
    pub jwt_secret_path: Option<PathBuf>,

    /// Deadline of `engine_newPayload` calls.
    pub new_payload_timeout: Duration,

    /// Deadline of `engine_forkchoiceUpdated` calls.
    pub forkchoice_updated_timeout: Duration,

    /// Deadline of `engine_getPayload` calls.
    pub get_payload_timeout: Duration,

    /// Deadline of `engine_exchangeCapabilities` calls.
    pub exchange_capabilities_timeout: Duration,

    /// Capabilities announced to the execution client.
    pub capabilities: Vec<String>,
}

impl EngineClientConfig {
    /// Create a configuration for the given endpoint with default timeouts.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self { rpc_url: rpc_url.into(), ..Self::default() }
    }

    /// Set the JWT secret path.
    pub fn with_jwt_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.jwt_secret_path = Some(path.into());
        self
    }

    /// Set the `engine_newPayload` timeout.
    pub fn with_new_payload_timeout(mut self, timeout: Duration) -> Self {
        self.new_payload_timeout = timeout;
        self
    }

    /// Set the `engine_forkchoiceUpdated` timeout.
    pub fn with_forkchoice_updated_timeout(mut self, timeout: Duration) -> Self {
        self.forkchoice_updated_timeout = timeout;
        self
    }

    /// Set the `engine_getPayload` timeout.
    pub fn with_get_payload_timeout(mut self, timeout: Duration) -> Self {
        self.get_payload_timeout = timeout;
        self
    }

    /// Set the `engine_exchangeCapabilities` timeout.
    pub fn with_exchange_capabilities_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_capabilities_timeout = timeout;
        self
    }

    /// Set the capabilities announced to the execution client.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Timeout of `operation`.
    pub fn timeout(&self, operation: EngineOperation) -> Duration {
        match operation {
            EngineOperation::NewPayload => self.new_payload_timeout,
            EngineOperation::ForkchoiceUpdated => self.forkchoice_updated_timeout,
            EngineOperation::GetPayload => self.get_payload_timeout,
            EngineOperation::ExchangeCapabilities => self.exchange_capabilities_timeout,
        }
    }

    /// Longest configured timeout; the transport's own request timeout must
    /// not be shorter.
    pub fn max_timeout(&self) -> Duration {
        EngineOperation::ALL.iter().map(|op| self.timeout(*op)).max().unwrap_or_default()
    }
}

impl Default for EngineClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            jwt_secret_path: None,
            new_payload_timeout: DEFAULT_NEW_PAYLOAD_TIMEOUT,
            forkchoice_updated_timeout: DEFAULT_FORKCHOICE_UPDATED_TIMEOUT,
            get_payload_timeout: DEFAULT_GET_PAYLOAD_TIMEOUT,
            exchange_capabilities_timeout: DEFAULT_EXCHANGE_CAPABILITIES_TIMEOUT,
            capabilities: supported_capabilities(),
        }
    }
}
