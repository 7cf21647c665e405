// src/memory/ingest.rs
// Plain-text ingestion: chunk a (text, source label) pair and upsert each
// chunk as its own record. The caller supplies already-extracted text;
// document parsing lives outside this crate.

use tracing::{info, warn};

use crate::error::CoreResult;
use crate::memory::store::{MemoryStore, RecordSource};

/// Words per chunk. Matches the ingestion granularity the store was tuned on.
const CHUNK_SIZE_WORDS: usize = 800;

/// Split text into chunks of roughly `CHUNK_SIZE_WORDS` whitespace tokens.
pub fn split_into_chunks(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    for window in words.chunks(CHUNK_SIZE_WORDS) {
        chunks.push(window.join(" "));
    }
    chunks
}

/// Chunk, embed and store a document. Returns the number of chunks written.
/// Blank input is a no-op. A failing chunk aborts the ingest and reports the
/// error; chunks already written stay (append-only store, no rollback).
pub async fn ingest_text(
    store: &MemoryStore,
    text: &str,
    source_name: &str,
) -> CoreResult<usize> {
    if text.trim().is_empty() {
        warn!(source = %source_name, "Ingest skipped: empty text");
        return Ok(0);
    }

    let chunks = split_into_chunks(text);
    info!(source = %source_name, chunks = chunks.len(), "Ingesting document");

    for (i, chunk) in chunks.iter().enumerate() {
        let title = format!("{} - chunk {}", source_name, i + 1);
        store
            .upsert(&title, None, chunk, RecordSource::Other(source_name.to_string()))
            .await?;
    }

    Ok(chunks.len())
}
