pub mod capability;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod research;
pub mod resolver;
pub mod summarizer;

pub use capability::{Capability, CapabilityKind, CapabilityRegistry};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use memory::{MemoryRecord, MemoryStore, RecordSource, ScoredMatch, StoreState};
pub use resolver::{ConversationAgent, ConversationTurn};
pub use summarizer::Summarizer;
