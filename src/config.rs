// src/config.rs
// Environment configuration surface. Credential presence here is the sole
// switch that decides each capability's initial availability.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub pinecone_api_key: Option<String>,
    pub pinecone_region: String,
    pub index_name: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(20);

        Self {
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embed_model: env::var("OPENAI_EMBED_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            chat_model: env::var("OPENAI_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            pinecone_api_key: non_empty(env::var("PINECONE_API_KEY").ok()),
            pinecone_region: env::var("PINECONE_ENV").unwrap_or_else(|_| "us-east-1".to_string()),
            index_name: env::var("MEMORY_INDEX_NAME")
                .unwrap_or_else(|_| "research-memory".to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4.1-mini".to_string(),
            pinecone_api_key: None,
            pinecone_region: "us-east-1".to_string(),
            index_name: "research-memory".to_string(),
            http_timeout: Duration::from_secs(20),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
