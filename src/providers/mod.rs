// src/providers/mod.rs

pub mod completion;
pub mod index;

pub use completion::{CompletionProvider, OpenAiProvider};
pub use index::{IndexDescription, IndexMatch, PineconeProvider, VectorIndexProvider};
