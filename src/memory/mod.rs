// src/memory/mod.rs

pub mod ingest;
pub mod store;

pub use ingest::ingest_text;
pub use store::{MemoryRecord, MemoryStore, RecordSource, ScoredMatch, StoreState};
