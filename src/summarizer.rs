// src/summarizer.rs
// Summarization service: remote bullet-point summaries via the completion
// capability, with a deterministic local extractive strategy as fallback.
// summarize() is total - it degrades, it never errors.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::capability::{CapabilityKind, CapabilityRegistry};
use crate::providers::CompletionProvider;

/// Inputs shorter than this are returned unchanged: too short to summarize.
const MIN_SUMMARIZE_LEN: usize = 200;

/// Output budget for the remote strategy, in tokens.
const REMOTE_MAX_TOKENS: u32 = 120;

pub const DEFAULT_SENTENCE_COUNT: usize = 5;

pub struct Summarizer {
    registry: CapabilityRegistry,
    completion: Arc<dyn CompletionProvider>,
    sentence_count: usize,
}

impl Summarizer {
    pub fn new(registry: CapabilityRegistry, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            registry,
            completion,
            sentence_count: DEFAULT_SENTENCE_COUNT,
        }
    }

    pub fn with_sentence_count(mut self, count: usize) -> Self {
        self.sentence_count = count;
        self
    }

    /// Summarize text. Remote strategy when the completion capability is
    /// available, local extractive strategy when it is off or the remote
    /// call fails.
    pub async fn summarize(&self, text: &str) -> String {
        if !self.registry.is_available(CapabilityKind::Completion) {
            debug!("Completion off, using local summarizer");
            return local_summarize(text, self.sentence_count);
        }

        match self.remote_summarize(text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Remote summarizer failed, falling back to local");
                local_summarize(text, self.sentence_count)
            }
        }
    }

    async fn remote_summarize(&self, text: &str) -> crate::error::CoreResult<String> {
        let user = format!(
            "Summarize the following text into 5-7 short bullet points.\n\
             Keep the summary short, clean, and under 120 tokens.\n\n\
             TEXT:\n{}",
            text
        );
        self.completion
            .complete(
                "You write concise bullet-point summaries.",
                &user,
                REMOTE_MAX_TOKENS,
            )
            .await
    }
}

/// Extractive summarization by term-frequency sentence scoring.
///
/// Deterministic: the same input and sentence count always produce the same
/// output. Selected sentences are joined highest-score-first (selection
/// order), not in document order; ties keep the earlier sentence.
pub fn local_summarize(text: &str, sentence_count: usize) -> String {
    if text.len() < MIN_SUMMARIZE_LEN {
        return text.to_string();
    }

    let clean_text = text.replace('\n', " ");
    let sentences = split_sentences(&clean_text);

    // Term frequencies over word tokens of the whole (lowercased) text.
    let word_re = Regex::new(r"\w+").expect("static regex");
    let lowered = text.to_lowercase();
    let mut freq: HashMap<&str, u64> = HashMap::new();
    for token in word_re.find_iter(&lowered) {
        *freq.entry(token.as_str()).or_insert(0) += 1;
    }

    // Score each distinct sentence by summing the frequencies of its
    // whitespace tokens that appear verbatim in the table. Sentences with no
    // matching token are never candidates.
    let mut scored: Vec<(String, u64)> = Vec::new();
    for sentence in &sentences {
        let mut score = 0u64;
        for word in sentence.to_lowercase().split_whitespace() {
            if let Some(f) = freq.get(word) {
                score += f;
            }
        }
        if score == 0 {
            continue;
        }
        if !scored.iter().any(|(s, _)| s == sentence) {
            scored.push((sentence.clone(), score));
        }
    }

    // Stable sort keeps earlier sentences ahead on equal scores.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(sentence_count);

    scored
        .into_iter()
        .map(|(s, _)| s)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on sentence-terminal punctuation followed by spaces, keeping the
/// punctuation attached to its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek() == Some(&' ') {
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}
