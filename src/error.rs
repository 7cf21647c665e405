// src/error.rs
// Crate-wide error taxonomy for the resolution core

use thiserror::Error;

use crate::capability::CapabilityKind;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the memory store, providers and research chain.
///
/// Zero matches / zero search results are never errors; callers get an
/// empty Vec instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required dependency has no credentials configured. Never retried.
    #[error("{kind} unavailable: {reason}")]
    CapabilityUnavailable {
        kind: CapabilityKind,
        reason: String,
    },

    /// A network/provider call failed at runtime.
    #[error("transport error: {0}")]
    Transport(String),

    /// An existing index disagrees with the embedding model's dimension.
    /// Fatal; surfaced verbatim, never patched over.
    #[error("index '{index}' has dimension {found}, embedding model produces {expected}")]
    ConfigurationMismatch {
        index: String,
        expected: usize,
        found: usize,
    },

    /// Operation invoked on a store handle outside the Ready state.
    #[error("memory store not ready: {0}")]
    NotReady(String),

    /// The remote provider answered but the payload was unusable.
    #[error("provider error: {0}")]
    Provider(String),
}

impl CoreError {
    /// True when the failure is a missing credential rather than a runtime fault.
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, CoreError::CapabilityUnavailable { .. })
    }
}
