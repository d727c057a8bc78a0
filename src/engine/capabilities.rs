//! Engine API capability tracking.
//!
//! [`CapabilityRegistry`] holds an immutable [`CapabilitySet`] snapshot behind
//! an [`ArcSwap`]. Readers load the current snapshot without locking;
//! `engine_exchangeCapabilities` builds a fresh set and swaps it in whole, so a
//! reader never observes a half-negotiated set.

use super::fork::EngineMethod;
use arc_swap::ArcSwap;
use std::{collections::BTreeMap, sync::Arc};

/// Engine API methods the bridge can speak.
pub const SUPPORTED_CAPABILITIES: &[&str] = &[
    "engine_newPayloadV3",
    "engine_newPayloadV4",
    "engine_forkchoiceUpdatedV3",
    "engine_getPayloadV3",
    "engine_getPayloadV4",
    "engine_getPayloadV5",
];

/// Default local capability list.
pub fn supported_capabilities() -> Vec<String> {
    SUPPORTED_CAPABILITIES.iter().map(|c| (*c).to_owned()).collect()
}

/// Result of one capability exchange: capability name to presence on the
/// execution client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    entries: BTreeMap<String, bool>,
}

impl CapabilitySet {
    /// Build from the local list sent and the remote list received.
    ///
    /// Remote capabilities are present; local ones the remote did not
    /// advertise are recorded as absent.
    pub fn from_exchange(local: &[String], remote: &[String]) -> Self {
        let mut entries: BTreeMap<String, bool> =
            remote.iter().map(|capability| (capability.clone(), true)).collect();
        for capability in local {
            entries.entry(capability.clone()).or_insert(false);
        }
        Self { entries }
    }

    /// Presence of a capability, `None` if it was never part of an exchange.
    pub fn get(&self, capability: &str) -> Option<bool> {
        self.entries.get(capability).copied()
    }

    /// Whether the execution client advertised `capability`.
    pub fn supports(&self, capability: &str) -> bool {
        self.get(capability).unwrap_or(false)
    }

    /// Whether the execution client advertised `method`.
    pub fn supports_method(&self, method: EngineMethod) -> bool {
        self.supports(method.as_str())
    }

    /// Capabilities advertised by the execution client.
    pub fn supported(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|(_, present)| **present).map(|(name, _)| name.as_str())
    }

    /// Local capabilities the execution client did not advertise.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|(_, present)| !**present).map(|(name, _)| name.as_str())
    }

    /// Number of recorded capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True until the first exchange.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide capability snapshot, owned by the bridge.
#[derive(Debug)]
pub struct CapabilityRegistry {
    current: ArcSwap<CapabilitySet>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { current: ArcSwap::from_pointee(CapabilitySet::default()) }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CapabilitySet> {
        self.current.load_full()
    }

    /// Replace the snapshot wholesale and return the new one.
    pub fn replace(&self, set: CapabilitySet) -> Arc<CapabilitySet> {
        let set = Arc::new(set);
        self.current.store(Arc::clone(&set));
        set
    }

    /// Whether the current snapshot reports `capability` present.
    pub fn has(&self, capability: &str) -> bool {
        self.current.load().supports(capability)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
