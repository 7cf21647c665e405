// src/research/provider.rs
// Research Provider: discover candidate sources for a query, fetch and
// summarize them, and write the findings back into the memory store. The
// resolver treats this as a capability-gated black box.

use std::sync::Arc;

use tracing::{info, warn};

use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::error::{CoreError, CoreResult};
use crate::memory::{MemoryStore, RecordSource};
use crate::research::scraper::WebSearch;
use crate::summarizer::Summarizer;

pub struct ResearchProvider {
    registry: CapabilityRegistry,
    search: WebSearch,
    summarizer: Arc<Summarizer>,
    store: Arc<MemoryStore>,
}

impl ResearchProvider {
    pub fn new(
        registry: CapabilityRegistry,
        search: WebSearch,
        summarizer: Arc<Summarizer>,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            registry,
            search,
            summarizer,
            store,
        }
    }

    /// Run one research pass: search, fetch up to `max_articles` pages,
    /// summarize each, persist the summaries, and return a report of what
    /// was stored. Pages with no usable text are skipped; a failing upsert
    /// skips that article rather than aborting the pass.
    pub async fn run(&self, query: &str, max_articles: usize) -> CoreResult<String> {
        self.require(CapabilityKind::WebDiscovery)?;
        self.require(CapabilityKind::Completion)?;

        info!(query = %query, max_articles, "Starting research pass");

        let hits = self.search.search(query).await;
        if hits.is_empty() {
            info!(query = %query, "Research found no candidate sources");
            return Ok(format!("# Research: {}\n\nNo sources found.\n", query));
        }

        let mut report = format!("# Research: {}\n\n", query);
        let mut stored = 0usize;

        for hit in hits.iter().take(max_articles) {
            let text = self.search.fetch_page(&hit.url).await;
            if text.trim().is_empty() {
                warn!(url = %hit.url, "No usable content, skipping");
                continue;
            }

            let summary = self.summarizer.summarize(&text).await;

            match self
                .store
                .upsert(&hit.title, Some(&hit.url), &summary, RecordSource::Web)
                .await
            {
                Ok(record) => {
                    stored += 1;
                    report.push_str(&format!(
                        "## {}\nSource: {}\n\n{}\n\n",
                        record.title, hit.url, summary
                    ));
                }
                Err(e) => {
                    warn!(url = %hit.url, error = %e, "Failed to store summary, skipping");
                }
            }
        }

        if stored == 0 {
            report.push_str("No articles yielded storable content.\n");
        }

        info!(query = %query, stored, "Research pass complete");
        Ok(report)
    }

    fn require(&self, kind: CapabilityKind) -> CoreResult<()> {
        if self.registry.is_available(kind) {
            Ok(())
        } else {
            Err(CoreError::CapabilityUnavailable {
                kind,
                reason: self.registry.reason(kind).to_string(),
            })
        }
    }
}
