// src/memory/store.rs
// Vector Memory Store - wraps the embedding provider and the similarity-search
// backend behind one handle with an explicit lifecycle:
//
//   Uninitialized -> Connecting -> Ready { dimension }
//                        \-> Failed
//
// connect/reconnect are serialized by a tokio Mutex; query/upsert/embed run
// concurrently once Ready. All operations outside Ready return NotReady.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::error::{CoreError, CoreResult};
use crate::providers::{CompletionProvider, VectorIndexProvider};

/// Probe input used to resolve the embedding dimension at connect time.
const DIMENSION_PROBE: &str = "dimension test";

/// Hard cap on query result counts, enforced at this layer.
const MAX_TOP_K: usize = 50;

const EMBED_CACHE_SIZE: usize = 1024;

/// Provenance of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSource {
    Web,
    Pdf,
    Other(String),
}

impl RecordSource {
    pub fn as_str(&self) -> &str {
        match self {
            RecordSource::Web => "web",
            RecordSource::Pdf => "pdf",
            RecordSource::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "web" => RecordSource::Web,
            "pdf" => RecordSource::Pdf,
            other => RecordSource::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of stored knowledge. Append-only: every upsert mints a fresh id,
/// records are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub summary: String,
    pub source: RecordSource,
    pub created_at: i64,
    pub embedding: Vec<f32>,
}

/// A query hit: record metadata plus its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMatch {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub summary: String,
    pub source: RecordSource,
    pub score: f32,
}

/// Lifecycle of the store handle.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreState {
    Uninitialized,
    Connecting,
    Ready { dimension: usize },
    Failed { reason: String },
}

/// Handle over the embedding provider and the vector index. Shared
/// process-wide behind an Arc.
pub struct MemoryStore {
    registry: CapabilityRegistry,
    completion: Arc<dyn CompletionProvider>,
    index: Arc<dyn VectorIndexProvider>,
    index_name: String,
    state: RwLock<StoreState>,
    connect_lock: tokio::sync::Mutex<()>,
    embed_cache: Mutex<LruCache<u64, Vec<f32>>>,
}

impl MemoryStore {
    pub fn new(
        registry: CapabilityRegistry,
        completion: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndexProvider>,
        index_name: impl Into<String>,
    ) -> Self {
        let cache_size = NonZeroUsize::new(EMBED_CACHE_SIZE).expect("cache size must be > 0");
        Self {
            registry,
            completion,
            index,
            index_name: index_name.into(),
            state: RwLock::new(StoreState::Uninitialized),
            connect_lock: tokio::sync::Mutex::new(()),
            embed_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    pub fn state(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Embedding dimension, available once Ready.
    pub fn dimension(&self) -> Option<usize> {
        match *self.state.read() {
            StoreState::Ready { dimension } => Some(dimension),
            _ => None,
        }
    }

    /// Connect to the backing index. Fails fast when either required
    /// capability is off; resolves the embedding dimension with one probe
    /// call; creates the index only if absent. An existing index with a
    /// different dimension is a fatal configuration mismatch.
    ///
    /// Idempotent: connecting an already-Ready store re-runs the same checks
    /// and lands in Ready again.
    pub async fn connect(&self) -> CoreResult<()> {
        let _guard = self.connect_lock.lock().await;

        *self.state.write() = StoreState::Connecting;

        if let Err(e) = self.require_capability(CapabilityKind::VectorIndex) {
            self.fail(&e);
            return Err(e);
        }
        if let Err(e) = self.require_capability(CapabilityKind::Completion) {
            self.fail(&e);
            return Err(e);
        }

        info!(index = %self.index_name, "Connecting memory store");

        let probe = match self.completion.embed(DIMENSION_PROBE).await {
            Ok(v) => v,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        let dimension = probe.len();
        debug!(dimension, "Embedding dimension resolved");

        let existing = match self.index.list_indexes().await {
            Ok(list) => list,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        match existing.iter().find(|d| d.name == self.index_name) {
            Some(description) if description.dimension != dimension => {
                let err = CoreError::ConfigurationMismatch {
                    index: self.index_name.clone(),
                    expected: dimension,
                    found: description.dimension,
                };
                self.fail(&err);
                return Err(err);
            }
            Some(_) => {
                debug!(index = %self.index_name, "Index exists with matching dimension");
            }
            None => {
                if let Err(e) = self.index.ensure_index(&self.index_name, dimension).await {
                    self.fail(&e);
                    return Err(e);
                }
            }
        }

        *self.state.write() = StoreState::Ready { dimension };
        info!(index = %self.index_name, dimension, "Memory store ready");
        Ok(())
    }

    /// Re-run connection from Ready or Failed. Serialized with connect so two
    /// concurrent reconnects cannot interleave.
    pub async fn reconnect(&self) -> CoreResult<()> {
        info!(index = %self.index_name, "Reconnecting memory store");
        self.connect().await
    }

    /// Embed text via the completion capability. Deterministic per model, so
    /// results are cached. Failures propagate; never replaced with a zero
    /// vector.
    pub async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        self.require_capability(CapabilityKind::Completion)?;

        let key = seahash::hash(text.as_bytes());
        if let Some(hit) = self.embed_cache.lock().get(&key) {
            debug!(text_len = text.len(), "Embedding cache hit");
            return Ok(hit.clone());
        }

        let vector = self.completion.embed(text).await?;
        self.embed_cache.lock().put(key, vector.clone());
        Ok(vector)
    }

    /// Store one record. Embeds the summary (title when the summary is
    /// blank), then performs a single atomic index write; nothing is written
    /// if the embed step fails. Every call mints a fresh id - re-ingesting
    /// identical content grows the store rather than updating in place.
    pub async fn upsert(
        &self,
        title: &str,
        url: Option<&str>,
        summary: &str,
        source: RecordSource,
    ) -> CoreResult<MemoryRecord> {
        self.require_capability(CapabilityKind::VectorIndex)?;
        let dimension = self.require_ready()?;

        let text = if summary.trim().is_empty() { title } else { summary };
        let embedding = self.embed(text).await?;

        if embedding.len() != dimension {
            return Err(CoreError::ConfigurationMismatch {
                index: self.index_name.clone(),
                expected: dimension,
                found: embedding.len(),
            });
        }

        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            url: url.map(|u| u.to_string()),
            summary: summary.to_string(),
            source,
            created_at: Utc::now().timestamp(),
            embedding,
        };

        let metadata = json!({
            "title": record.title,
            "url": record.url.clone().unwrap_or_default(),
            "summary": record.summary,
            "source": record.source.as_str(),
            "timestamp": record.created_at,
        });

        self.index
            .upsert(&self.index_name, &record.id, &record.embedding, metadata)
            .await?;

        info!(id = %record.id, title = %record.title, "Record stored");
        Ok(record)
    }

    /// Top-K similarity lookup. Returns matches in descending score order;
    /// an empty result is not an error.
    pub async fn query(&self, question: &str, top_k: usize) -> CoreResult<Vec<ScoredMatch>> {
        self.require_capability(CapabilityKind::VectorIndex)?;
        self.require_capability(CapabilityKind::Completion)?;
        self.require_ready()?;

        let top_k = top_k.clamp(1, MAX_TOP_K);
        let vector = self.embed(question).await?;

        let raw = self.index.query(&self.index_name, &vector, top_k).await?;

        let mut matches: Vec<ScoredMatch> = raw
            .into_iter()
            .map(|m| {
                let meta = &m.metadata;
                let url = meta["url"].as_str().unwrap_or_default();
                ScoredMatch {
                    id: m.id,
                    title: meta["title"].as_str().unwrap_or_default().to_string(),
                    url: if url.is_empty() {
                        None
                    } else {
                        Some(url.to_string())
                    },
                    summary: meta["summary"].as_str().unwrap_or_default().to_string(),
                    source: RecordSource::from_label(meta["source"].as_str().unwrap_or("web")),
                    score: m.score,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!(question_len = question.len(), matches = matches.len(), "Memory query complete");
        Ok(matches)
    }

    fn require_capability(&self, kind: CapabilityKind) -> CoreResult<()> {
        if self.registry.is_available(kind) {
            Ok(())
        } else {
            Err(CoreError::CapabilityUnavailable {
                kind,
                reason: self.registry.reason(kind).to_string(),
            })
        }
    }

    fn require_ready(&self) -> CoreResult<usize> {
        match *self.state.read() {
            StoreState::Ready { dimension } => Ok(dimension),
            ref other => Err(CoreError::NotReady(format!("state is {:?}", other))),
        }
    }

    fn fail(&self, err: &CoreError) {
        warn!(index = %self.index_name, error = %err, "Memory store connection failed");
        *self.state.write() = StoreState::Failed {
            reason: err.to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{IndexDescription, IndexMatch};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic hash-based embedder, 8-dimensional.
    struct HashEmbedder {
        calls: AtomicUsize,
    }

    impl HashEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn hash_vector(text: &str) -> Vec<f32> {
        let hash = seahash::hash(text.as_bytes());
        (0..8)
            .map(|i| ((hash >> (i * 8)) & 0xFF) as f32 + 1.0)
            .collect()
    }

    #[async_trait]
    impl CompletionProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(hash_vector(text))
        }

        async fn complete(&self, _system: &str, _user: &str, _max: u32) -> CoreResult<String> {
            Ok("mock".to_string())
        }

        fn model_name(&self) -> &str {
            "hash-embedder"
        }
    }

    /// In-memory cosine index.
    struct InMemoryIndex {
        dimension: Mutex<Option<usize>>,
        rows: Mutex<Vec<(String, Vec<f32>, Value)>>,
    }

    impl InMemoryIndex {
        fn empty() -> Self {
            Self {
                dimension: Mutex::new(None),
                rows: Mutex::new(Vec::new()),
            }
        }

        fn with_existing_dimension(dimension: usize) -> Self {
            Self {
                dimension: Mutex::new(Some(dimension)),
                rows: Mutex::new(Vec::new()),
            }
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let ma: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if ma == 0.0 || mb == 0.0 {
            0.0
        } else {
            dot / (ma * mb)
        }
    }

    #[async_trait]
    impl VectorIndexProvider for InMemoryIndex {
        async fn list_indexes(&self) -> CoreResult<Vec<IndexDescription>> {
            Ok(match *self.dimension.lock() {
                Some(dimension) => vec![IndexDescription {
                    name: "research-memory".to_string(),
                    dimension,
                    host: "local".to_string(),
                }],
                None => vec![],
            })
        }

        async fn ensure_index(&self, _name: &str, dimension: usize) -> CoreResult<()> {
            let mut dim = self.dimension.lock();
            if dim.is_none() {
                *dim = Some(dimension);
            }
            Ok(())
        }

        async fn upsert(
            &self,
            _name: &str,
            id: &str,
            values: &[f32],
            metadata: Value,
        ) -> CoreResult<()> {
            self.rows
                .lock()
                .push((id.to_string(), values.to_vec(), metadata));
            Ok(())
        }

        async fn query(
            &self,
            _name: &str,
            values: &[f32],
            top_k: usize,
        ) -> CoreResult<Vec<IndexMatch>> {
            let mut matches: Vec<IndexMatch> = self
                .rows
                .lock()
                .iter()
                .map(|(id, v, meta)| IndexMatch {
                    id: id.clone(),
                    score: cosine(values, v),
                    metadata: meta.clone(),
                })
                .collect();
            matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            matches.truncate(top_k);
            Ok(matches)
        }
    }

    fn make_store(index: InMemoryIndex) -> MemoryStore {
        MemoryStore::new(
            CapabilityRegistry::all_available(),
            Arc::new(HashEmbedder::new()),
            Arc::new(index),
            "research-memory",
        )
    }

    #[tokio::test]
    async fn test_connect_creates_index_and_becomes_ready() {
        let store = make_store(InMemoryIndex::empty());
        assert_eq!(store.state(), StoreState::Uninitialized);

        store.connect().await.unwrap();
        assert_eq!(store.state(), StoreState::Ready { dimension: 8 });
        assert_eq!(store.dimension(), Some(8));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let store = make_store(InMemoryIndex::empty());
        store.connect().await.unwrap();
        store.connect().await.unwrap();
        assert_eq!(store.state(), StoreState::Ready { dimension: 8 });
    }

    #[tokio::test]
    async fn test_connect_dimension_mismatch_is_fatal() {
        let store = make_store(InMemoryIndex::with_existing_dimension(16));
        let err = store.connect().await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationMismatch { expected: 8, found: 16, .. }));
        assert!(matches!(store.state(), StoreState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_reconnect_recovers_from_failed() {
        let store = make_store(InMemoryIndex::with_existing_dimension(16));
        assert!(store.connect().await.is_err());

        // Mismatch persists, reconnect fails again but transitions through
        // Connecting rather than sticking in the old Failed state.
        let err = store.reconnect().await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationMismatch { .. }));
    }

    #[tokio::test]
    async fn test_connect_fails_fast_without_capabilities() {
        let registry = CapabilityRegistry::all_available()
            .with_disabled(CapabilityKind::VectorIndex, "no key");
        let store = MemoryStore::new(
            registry,
            Arc::new(HashEmbedder::new()),
            Arc::new(InMemoryIndex::empty()),
            "research-memory",
        );
        let err = store.connect().await.unwrap_err();
        assert!(err.is_capability_gap());
        assert!(matches!(store.state(), StoreState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_operations_outside_ready_are_rejected() {
        let store = make_store(InMemoryIndex::empty());
        let err = store
            .upsert("T", None, "summary", RecordSource::Web)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotReady(_)));

        let err = store.query("anything", 5).await.unwrap_err();
        assert!(matches!(err, CoreError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_upsert_query_round_trip() {
        let store = make_store(InMemoryIndex::empty());
        store.connect().await.unwrap();

        let record = store
            .upsert(
                "Rust",
                Some("http://example.com"),
                "Rust is a systems programming language.",
                RecordSource::Web,
            )
            .await
            .unwrap();
        assert_eq!(record.embedding.len(), 8);

        let matches = store
            .query("Rust is a systems programming language.", 5)
            .await
            .unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].id, record.id);
        assert!(matches[0].score > 0.9);
        assert_eq!(matches[0].url.as_deref(), Some("http://example.com"));
    }

    #[tokio::test]
    async fn test_upsert_falls_back_to_title_when_summary_blank() {
        let store = make_store(InMemoryIndex::empty());
        store.connect().await.unwrap();

        let record = store
            .upsert("Only a title", None, "   ", RecordSource::Pdf)
            .await
            .unwrap();
        assert_eq!(record.embedding, hash_vector("Only a title"));
    }

    #[tokio::test]
    async fn test_each_upsert_mints_fresh_id() {
        let store = make_store(InMemoryIndex::empty());
        store.connect().await.unwrap();

        let a = store.upsert("T", None, "same text", RecordSource::Web).await.unwrap();
        let b = store.upsert("T", None, "same text", RecordSource::Web).await.unwrap();
        assert_ne!(a.id, b.id);

        // Both duplicates are retrievable: append-only, no dedup.
        let matches = store.query("same text", 5).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_query_empty_index_returns_empty_vec() {
        let store = make_store(InMemoryIndex::empty());
        store.connect().await.unwrap();
        let matches = store.query("anything at all", 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_embed_is_cached_and_dimension_stable() {
        let embedder = Arc::new(HashEmbedder::new());
        let store = MemoryStore::new(
            CapabilityRegistry::all_available(),
            embedder.clone(),
            Arc::new(InMemoryIndex::empty()),
            "research-memory",
        );

        let a = store.embed("hello world").await.unwrap();
        let b = store.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), b.len());
        // Second call must come from cache.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_requires_completion_capability() {
        let registry = CapabilityRegistry::all_available()
            .with_disabled(CapabilityKind::Completion, "no key");
        let store = MemoryStore::new(
            registry,
            Arc::new(HashEmbedder::new()),
            Arc::new(InMemoryIndex::empty()),
            "research-memory",
        );
        let err = store.embed("text").await.unwrap_err();
        assert!(err.is_capability_gap());
    }
}
