// src/capability.rs
// Capability Registry - one place that knows which optional external
// dependencies are usable. Resolved once at startup from credential presence;
// no network probe. A capability marked available can still fail at first
// use, and the failing call reports its own error. The registry is a
// planning signal, not a health check.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;

/// One class of optional external dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// Embedding + chat completion provider
    Completion,
    /// Similarity-search index backend
    VectorIndex,
    /// Web search + page fetch
    WebDiscovery,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Completion => write!(f, "completion"),
            CapabilityKind::VectorIndex => write!(f, "vector-index"),
            CapabilityKind::WebDiscovery => write!(f, "web-discovery"),
        }
    }
}

/// Resolved availability of one dependency class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub kind: CapabilityKind,
    pub available: bool,
    pub reason: Option<String>,
}

impl Capability {
    fn resolved(kind: CapabilityKind, config: &Config) -> Self {
        let (available, reason) = match kind {
            CapabilityKind::Completion => match config.openai_api_key {
                Some(_) => (true, None),
                None => (false, Some("OPENAI_API_KEY not set".to_string())),
            },
            CapabilityKind::VectorIndex => match config.pinecone_api_key {
                Some(_) => (true, None),
                None => (false, Some("PINECONE_API_KEY not set".to_string())),
            },
            // Discovery needs no credentials; it is always planned as usable
            // and degrades inside the scraper chain instead.
            CapabilityKind::WebDiscovery => (true, None),
        };

        Self {
            kind,
            available,
            reason,
        }
    }
}

/// Process-wide record of capability availability. Cheap to clone; safe for
/// concurrent reads (immutable after construction, except explicit reconnect).
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    capabilities: [Capability; 3],
}

impl CapabilityRegistry {
    /// Resolve all capabilities from configuration, once.
    pub fn from_config(config: &Config) -> Self {
        let capabilities = [
            Capability::resolved(CapabilityKind::Completion, config),
            Capability::resolved(CapabilityKind::VectorIndex, config),
            Capability::resolved(CapabilityKind::WebDiscovery, config),
        ];

        for cap in &capabilities {
            if cap.available {
                info!(capability = %cap.kind, "Capability available");
            } else {
                warn!(
                    capability = %cap.kind,
                    reason = cap.reason.as_deref().unwrap_or("unknown"),
                    "Capability unavailable"
                );
            }
        }

        Self { capabilities }
    }

    /// Registry with every capability enabled. Test scaffolding.
    pub fn all_available() -> Self {
        let mk = |kind| Capability {
            kind,
            available: true,
            reason: None,
        };
        Self {
            capabilities: [
                mk(CapabilityKind::Completion),
                mk(CapabilityKind::VectorIndex),
                mk(CapabilityKind::WebDiscovery),
            ],
        }
    }

    /// Registry with a capability forced off. Test scaffolding.
    pub fn with_disabled(mut self, kind: CapabilityKind, reason: &str) -> Self {
        let cap = self.slot_mut(kind);
        cap.available = false;
        cap.reason = Some(reason.to_string());
        self
    }

    pub fn get(&self, kind: CapabilityKind) -> &Capability {
        &self.capabilities[Self::slot_index(kind)]
    }

    pub fn is_available(&self, kind: CapabilityKind) -> bool {
        self.get(kind).available
    }

    /// Human-readable cause of unavailability, or "available".
    pub fn reason(&self, kind: CapabilityKind) -> &str {
        let cap = self.get(kind);
        cap.reason.as_deref().unwrap_or("available")
    }

    /// Re-resolve one capability from current configuration. Either the
    /// capability comes back fully resolved or it is left unavailable with a
    /// reason; there is no partial state to observe.
    pub fn reconnect(&mut self, kind: CapabilityKind, config: &Config) -> &Capability {
        let fresh = Capability::resolved(kind, config);
        info!(
            capability = %kind,
            available = fresh.available,
            "Capability re-resolved"
        );
        let slot = self.slot_mut(kind);
        *slot = fresh;
        slot
    }

    fn slot_index(kind: CapabilityKind) -> usize {
        match kind {
            CapabilityKind::Completion => 0,
            CapabilityKind::VectorIndex => 1,
            CapabilityKind::WebDiscovery => 2,
        }
    }

    fn slot_mut(&mut self, kind: CapabilityKind) -> &mut Capability {
        &mut self.capabilities[Self::slot_index(kind)]
    }
}
