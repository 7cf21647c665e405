// src/providers/index.rs
// Vector index provider abstraction plus a Pinecone serverless REST client.
// Control-plane calls (list/create) go to api.pinecone.io; data-plane calls
// (upsert/query) go to the per-index host returned by the control plane.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};

/// Description of one backing index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub host: String,
}

/// One ranked match from a similarity query.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

/// Similarity-search backend contract consumed by the memory store.
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    async fn list_indexes(&self) -> CoreResult<Vec<IndexDescription>>;

    /// Create the named index with the given dimension if it does not exist.
    /// Must be a no-op when an index of that name already exists.
    async fn ensure_index(&self, name: &str, dimension: usize) -> CoreResult<()>;

    async fn upsert(&self, name: &str, id: &str, values: &[f32], metadata: Value) -> CoreResult<()>;

    async fn query(&self, name: &str, values: &[f32], top_k: usize) -> CoreResult<Vec<IndexMatch>>;
}

/// Pinecone serverless client over plain reqwest.
pub struct PineconeProvider {
    api_key: String,
    region: String,
    client: reqwest::Client,
    // Data-plane host per index, cached after the first control-plane lookup.
    host_cache: RwLock<Option<(String, String)>>,
}

#[derive(Deserialize)]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Value,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

const CONTROL_PLANE: &str = "https://api.pinecone.io";

impl PineconeProvider {
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        let api_key = config.pinecone_api_key.clone().ok_or_else(|| {
            CoreError::CapabilityUnavailable {
                kind: crate::capability::CapabilityKind::VectorIndex,
                reason: "PINECONE_API_KEY not set".to_string(),
            }
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        info!(region = %config.pinecone_region, "Initializing vector index provider");

        Ok(Self {
            api_key,
            region: config.pinecone_region.clone(),
            client,
            host_cache: RwLock::new(None),
        })
    }

    /// Resolve the data-plane host for an index, via cache or control plane.
    async fn host_for(&self, name: &str) -> CoreResult<String> {
        if let Some((cached_name, host)) = self.host_cache.read().as_ref() {
            if cached_name == name {
                return Ok(host.clone());
            }
        }

        let indexes = self.list_indexes().await?;
        let description = indexes
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CoreError::NotReady(format!("index '{}' does not exist", name)))?;

        if description.host.is_empty() {
            return Err(CoreError::Provider(format!(
                "index '{}' has no data-plane host yet",
                name
            )));
        }

        *self.host_cache.write() = Some((name.to_string(), description.host.clone()));
        Ok(description.host)
    }
}

#[async_trait]
impl VectorIndexProvider for PineconeProvider {
    async fn list_indexes(&self) -> CoreResult<Vec<IndexDescription>> {
        let url = format!("{}/indexes", CONTROL_PLANE);
        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let body: ListIndexesResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        Ok(body.indexes)
    }

    async fn ensure_index(&self, name: &str, dimension: usize) -> CoreResult<()> {
        let existing = self.list_indexes().await?;
        if existing.iter().any(|d| d.name == name) {
            debug!(index = %name, "Index already exists");
            return Ok(());
        }

        info!(index = %name, dimension, "Creating index");
        let url = format!("{}/indexes", CONTROL_PLANE);
        let req = CreateIndexRequest {
            name,
            dimension,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: &self.region,
                },
            },
        };

        self.client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        Ok(())
    }

    async fn upsert(&self, name: &str, id: &str, values: &[f32], metadata: Value) -> CoreResult<()> {
        let host = self.host_for(name).await?;
        let url = format!("https://{}/vectors/upsert", host);
        let req = UpsertRequest {
            vectors: vec![UpsertVector {
                id,
                values,
                metadata,
            }],
        };

        self.client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        debug!(index = %name, id = %id, "Vector upserted");
        Ok(())
    }

    async fn query(&self, name: &str, values: &[f32], top_k: usize) -> CoreResult<Vec<IndexMatch>> {
        let host = self.host_for(name).await?;
        let url = format!("https://{}/query", host);
        let req = QueryRequest {
            vector: values,
            top_k,
            include_metadata: true,
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        debug!(index = %name, matches = body.matches.len(), "Query returned");
        Ok(body.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_key() {
        let provider = PineconeProvider::from_config(&Config::default());
        assert!(matches!(
            provider,
            Err(CoreError::CapabilityUnavailable { .. })
        ));
    }

    #[test]
    fn test_query_response_parses_missing_metadata() {
        let raw = r#"{"matches":[{"id":"a","score":0.93}]}"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].id, "a");
        assert!(parsed.matches[0].metadata.is_null());
    }

    #[test]
    fn test_index_description_defaults_host() {
        let raw = r#"{"name":"research-memory","dimension":1536}"#;
        let parsed: IndexDescription = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.dimension, 1536);
        assert!(parsed.host.is_empty());
    }
}
