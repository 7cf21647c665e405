// src/resolver.rs
// Tiered Answer Resolver. Memory first, research on miss, one memory retry
// after research. Every failure path resolves to a string answer; nothing
// raises past ask().

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::memory::{MemoryStore, ScoredMatch};
use crate::providers::CompletionProvider;
use crate::research::ResearchProvider;

/// Returned when the completion capability is off: no answer can be
/// generated and no ungrounded research is launched.
pub const COMPLETION_DISABLED_MSG: &str =
    "Answer generation is disabled: no completion provider credentials are configured.";

/// Terminal message when memory stays empty even after a research pass.
pub const INSUFFICIENT_INFO_MSG: &str =
    "I could not find enough information, even after research.";

const GROUNDED_SYSTEM_PROMPT: &str = "You answer strictly using memory.";
const GROUNDED_MAX_TOKENS: u32 = 200;

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_MAX_ARTICLES: usize = 2;

/// Minimum similarity for a match to count as usable memory. Tuning knob;
/// at 0.0 any match with a non-empty summary suppresses research.
const MIN_MATCH_SCORE: f32 = 0.0;

/// One completed question/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
}

/// Session-scoped orchestration core.
pub struct ConversationAgent {
    registry: CapabilityRegistry,
    store: Arc<MemoryStore>,
    completion: Arc<dyn CompletionProvider>,
    research: ResearchProvider,
    history: Mutex<Vec<ConversationTurn>>,
    top_k: usize,
    max_articles: usize,
}

impl ConversationAgent {
    pub fn new(
        registry: CapabilityRegistry,
        store: Arc<MemoryStore>,
        completion: Arc<dyn CompletionProvider>,
        research: ResearchProvider,
    ) -> Self {
        Self {
            registry,
            store,
            completion,
            research,
            history: Mutex::new(Vec::new()),
            top_k: DEFAULT_TOP_K,
            max_articles: DEFAULT_MAX_ARTICLES,
        }
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles;
        self
    }

    /// Resolve a query to an answer. Infallible at this boundary: every
    /// collaborator error is converted to a user-facing message where it
    /// occurs.
    pub async fn ask(&self, query: &str) -> String {
        info!(query = %query, "Resolving query");

        let answer = self.resolve(query).await;

        self.history.lock().push(ConversationTurn {
            query: query.to_string(),
            answer: answer.clone(),
        });

        answer
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    async fn resolve(&self, query: &str) -> String {
        // Memory tier. Unreachable memory is a degraded mode, not an error.
        if self.memory_reachable() {
            match self.answer_from_memory(query).await {
                MemoryOutcome::Answer(answer) => return answer,
                MemoryOutcome::Terminal(message) => return message,
                MemoryOutcome::Insufficient => {
                    debug!("Memory insufficient, considering research");
                }
            }
        } else {
            info!(
                vector_index = self.registry.reason(CapabilityKind::VectorIndex),
                completion = self.registry.reason(CapabilityKind::Completion),
                "Memory tier unreachable, skipping"
            );
        }

        // Research that cannot be summarized or reasoned over is not
        // attempted.
        if !self.registry.is_available(CapabilityKind::Completion) {
            return COMPLETION_DISABLED_MSG.to_string();
        }

        info!(query = %query, "Memory insufficient, running web research");
        if let Err(e) = self.research.run(query, self.max_articles).await {
            warn!(error = %e, "Research pass failed");
            return format!("Research failed: {}", e);
        }

        // The research pass wrote new records; one retry against memory.
        if self.memory_reachable() {
            info!("Retrying memory after research");
            match self.answer_from_memory(query).await {
                MemoryOutcome::Answer(answer) => return answer,
                MemoryOutcome::Terminal(message) => return message,
                MemoryOutcome::Insufficient => {}
            }
        }

        INSUFFICIENT_INFO_MSG.to_string()
    }

    fn memory_reachable(&self) -> bool {
        self.registry.is_available(CapabilityKind::VectorIndex)
            && self.registry.is_available(CapabilityKind::Completion)
    }

    async fn answer_from_memory(&self, query: &str) -> MemoryOutcome {
        let matches = match self.store.query(query, self.top_k).await {
            Ok(matches) => matches,
            Err(e) => {
                // A failing lookup degrades to "nothing found"; the next
                // tier still runs.
                warn!(error = %e, "Memory query failed");
                return MemoryOutcome::Insufficient;
            }
        };

        let usable: Vec<&ScoredMatch> = matches
            .iter()
            .filter(|m| m.score >= MIN_MATCH_SCORE && !m.summary.trim().is_empty())
            .collect();

        if usable.is_empty() {
            return MemoryOutcome::Insufficient;
        }

        debug!(matches = usable.len(), "Found usable memory");

        if !self.registry.is_available(CapabilityKind::Completion) {
            return MemoryOutcome::Terminal(COMPLETION_DISABLED_MSG.to_string());
        }

        let memory_text = usable
            .iter()
            .map(|m| format!("- {}", m.summary))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Use ONLY the memory below to answer the question.\n\n\
             ### MEMORY:\n{}\n\n\
             ### QUESTION:\n{}\n\n\
             Provide a short and clear answer.",
            memory_text, query
        );

        match self
            .completion
            .complete(GROUNDED_SYSTEM_PROMPT, &prompt, GROUNDED_MAX_TOKENS)
            .await
        {
            Ok(answer) => MemoryOutcome::Answer(answer),
            Err(e) => {
                warn!(error = %e, "Grounded generation failed");
                MemoryOutcome::Terminal(format!(
                    "The completion provider failed while answering: {}",
                    e
                ))
            }
        }
    }
}

enum MemoryOutcome {
    /// Grounded answer generated; terminal success.
    Answer(String),
    /// Terminal degraded-mode message; later tiers must not run.
    Terminal(String),
    /// Nothing usable in memory; the next tier may run.
    Insufficient,
}
