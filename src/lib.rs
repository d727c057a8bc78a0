//! Engine Bridge
//!
//! Consensus-layer client of an execution engine. The bridge speaks the
//! Engine API over authenticated JSON-RPC and turns every answer into either a
//! usable value or a classified [`EngineError`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Consensus layer caller                        │
//! └───────────────┬──────────────────────────────────────┬───────────────┘
//!                 │ CallContext (cancellation)           │ Arc<CapabilitySet>
//!                 ▼                                      │
//! ┌──────────────────────────────────────────────────────┴───────────────┐
//! │                            EngineBridge                              │
//! │                                                                      │
//! │  new_payload ─────────┐                                              │
//! │  forkchoice_updated ──┼──▶ Deadline ──▶ EngineTransport              │
//! │  get_payload ─────────┤       │              │                       │
//! │  exchange_capabilities┘       │              ▼                       │
//! │                               │     TransportResult<Option<_>>       │
//! │                               ▼              │                       │
//! │                       EngineMetrics          ├──▶ EngineError        │
//! │                     (duration, timeouts)     │                       │
//! │                                              ▼                       │
//! │  ┌──────────────────┐   ┌────────────────────────┐                   │
//! │  │CapabilityRegistry│   │ process_payload_status │                   │
//! │  │    (ArcSwap)     │   └────────────────────────┘                   │
//! │  └──────────────────┘                                                │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                 │ JWT-authenticated JSON-RPC
//!                                 ▼
//!                          Execution client
//! ```
//!
//! # Modules
//!
//! - [`engine`]: bridge, transport, status processing, errors and capabilities

#![warn(unused_crate_dependencies)]
// Dependencies used by the binary
use eyre as _;

pub mod engine;

pub use engine::{
    CallContext, EngineBridge, EngineClientConfig, EngineError, EngineErrorKind, EngineFork,
    EngineTransport, JsonRpcTransport,
};

// Used by `#[traced_test]` expansions
#[cfg(test)]
use tracing as _;
