//! Fork-dependent Engine API method selection.
//!
//! Every bridge call resolves its wire variant exactly once, from an
//! [`EngineFork`], into an [`EngineMethod`]:
//!
//! | Fork   | newPayload | forkchoiceUpdated | getPayload | blobs bundle |
//! |--------|------------|-------------------|------------|--------------|
//! | Cancun | V3         | V3                | V3         | V1           |
//! | Prague | V4         | V3                | V4         | V1           |
//! | Osaka  | V4         | V3                | V5         | V2           |

use std::fmt;

/// Execution-layer fork selecting the Engine API wire variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineFork {
    /// Deneb on the consensus side.
    Cancun,
    /// Electra on the consensus side.
    Prague,
    /// Fulu on the consensus side.
    Osaka,
}

/// Fork version whose leading byte does not map to a supported fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported fork version 0x{}", alloy_primitives::hex::encode(.0))]
pub struct UnsupportedForkVersion(pub [u8; 4]);

impl EngineFork {
    /// Resolves a consensus fork version. Only the leading byte is significant,
    /// the remaining bytes distinguish networks.
    pub fn from_fork_version(version: [u8; 4]) -> Result<Self, UnsupportedForkVersion> {
        match version[0] {
            0x04 => Ok(Self::Cancun),
            0x05 => Ok(Self::Prague),
            0x06 => Ok(Self::Osaka),
            _ => Err(UnsupportedForkVersion(version)),
        }
    }

    /// Method used to submit a payload.
    pub const fn new_payload(self) -> EngineMethod {
        match self {
            Self::Cancun => EngineMethod::NewPayloadV3,
            Self::Prague | Self::Osaka => EngineMethod::NewPayloadV4,
        }
    }

    /// Method used to notify fork choice.
    pub const fn forkchoice_updated(self) -> EngineMethod {
        EngineMethod::ForkchoiceUpdatedV3
    }

    /// Method used to retrieve a built payload.
    pub const fn get_payload(self) -> EngineMethod {
        match self {
            Self::Cancun => EngineMethod::GetPayloadV3,
            Self::Prague => EngineMethod::GetPayloadV4,
            Self::Osaka => EngineMethod::GetPayloadV5,
        }
    }

    /// Whether payloads of this fork carry EIP-7685 execution requests.
    pub const fn has_execution_requests(self) -> bool {
        !matches!(self, Self::Cancun)
    }
}

impl fmt::Display for EngineFork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancun => "cancun",
            Self::Prague => "prague",
            Self::Osaka => "osaka",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for EngineFork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cancun" | "deneb" => Ok(Self::Cancun),
            "prague" | "electra" => Ok(Self::Prague),
            "osaka" | "fulu" => Ok(Self::Osaka),
            other => Err(format!("unknown fork: {other}")),
        }
    }
}

/// Engine API JSON-RPC methods spoken by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineMethod {
    /// `engine_newPayloadV3`
    NewPayloadV3,
    /// `engine_newPayloadV4`
    NewPayloadV4,
    /// `engine_forkchoiceUpdatedV3`
    ForkchoiceUpdatedV3,
    /// `engine_getPayloadV3`
    GetPayloadV3,
    /// `engine_getPayloadV4`
    GetPayloadV4,
    /// `engine_getPayloadV5`
    GetPayloadV5,
    /// `engine_exchangeCapabilities`
    ExchangeCapabilities,
}

impl EngineMethod {
    /// JSON-RPC method name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewPayloadV3 => "engine_newPayloadV3",
            Self::NewPayloadV4 => "engine_newPayloadV4",
            Self::ForkchoiceUpdatedV3 => "engine_forkchoiceUpdatedV3",
            Self::GetPayloadV3 => "engine_getPayloadV3",
            Self::GetPayloadV4 => "engine_getPayloadV4",
            Self::GetPayloadV5 => "engine_getPayloadV5",
            Self::ExchangeCapabilities => "engine_exchangeCapabilities",
        }
    }
}

impl fmt::Display for EngineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
