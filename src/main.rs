// recall/src/main.rs - interactive driver for the tiered research assistant

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use recall::capability::CapabilityKind;
use recall::providers::{OpenAiProvider, PineconeProvider};
use recall::research::{ResearchProvider, WebSearch};
use recall::{CapabilityRegistry, Config, ConversationAgent, MemoryStore, Summarizer};

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let registry = CapabilityRegistry::from_config(&config);

    for kind in [
        CapabilityKind::Completion,
        CapabilityKind::VectorIndex,
        CapabilityKind::WebDiscovery,
    ] {
        println!(
            "capability {}: {}",
            kind,
            if registry.is_available(kind) {
                "available".to_string()
            } else {
                registry.reason(kind).to_string()
            }
        );
    }

    // Providers exist only when their credentials do; a NullProvider stands
    // in otherwise so the store can still report unavailability per call.
    let completion: Arc<dyn recall::providers::CompletionProvider> =
        match OpenAiProvider::from_config(&config) {
            Ok(p) => Arc::new(p),
            Err(_) => Arc::new(null_provider::NullCompletion),
        };
    let index: Arc<dyn recall::providers::VectorIndexProvider> =
        match PineconeProvider::from_config(&config) {
            Ok(p) => Arc::new(p),
            Err(_) => Arc::new(null_provider::NullIndex),
        };

    let store = Arc::new(MemoryStore::new(
        registry.clone(),
        completion.clone(),
        index,
        config.index_name.clone(),
    ));

    if registry.is_available(CapabilityKind::VectorIndex)
        && registry.is_available(CapabilityKind::Completion)
    {
        match store.connect().await {
            Ok(()) => println!("memory connected: index '{}'", config.index_name),
            Err(e) => println!("memory connection failed: {}", e),
        }
    } else {
        println!("memory disabled, continuing without it");
    }

    let search = WebSearch::duckduckgo(config.http_timeout)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let summarizer = Arc::new(Summarizer::new(registry.clone(), completion.clone()));
    let research = ResearchProvider::new(registry.clone(), search, summarizer, store.clone());

    let agent = ConversationAgent::new(registry, store, completion, research);

    println!("ask a question (empty line to exit):");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        let answer = agent.ask(query).await;
        println!("{}\n", answer);
    }

    Ok(())
}

/// Stand-ins used when credentials are absent; every call reports the gap.
mod null_provider {
    use async_trait::async_trait;
    use recall::capability::CapabilityKind;
    use recall::providers::{CompletionProvider, IndexDescription, IndexMatch, VectorIndexProvider};
    use recall::{CoreError, CoreResult};

    fn gap(kind: CapabilityKind) -> CoreError {
        CoreError::CapabilityUnavailable {
            kind,
            reason: "credentials not configured".to_string(),
        }
    }

    pub struct NullCompletion;

    #[async_trait]
    impl CompletionProvider for NullCompletion {
        async fn embed(&self, _text: &str) -> CoreResult<Vec<f32>> {
            Err(gap(CapabilityKind::Completion))
        }
        async fn complete(&self, _s: &str, _u: &str, _m: u32) -> CoreResult<String> {
            Err(gap(CapabilityKind::Completion))
        }
        fn model_name(&self) -> &str {
            "disabled"
        }
    }

    pub struct NullIndex;

    #[async_trait]
    impl VectorIndexProvider for NullIndex {
        async fn list_indexes(&self) -> CoreResult<Vec<IndexDescription>> {
            Err(gap(CapabilityKind::VectorIndex))
        }
        async fn ensure_index(&self, _name: &str, _dimension: usize) -> CoreResult<()> {
            Err(gap(CapabilityKind::VectorIndex))
        }
        async fn upsert(
            &self,
            _name: &str,
            _id: &str,
            _values: &[f32],
            _metadata: serde_json::Value,
        ) -> CoreResult<()> {
            Err(gap(CapabilityKind::VectorIndex))
        }
        async fn query(
            &self,
            _name: &str,
            _values: &[f32],
            _top_k: usize,
        ) -> CoreResult<Vec<IndexMatch>> {
            Err(gap(CapabilityKind::VectorIndex))
        }
    }
}
