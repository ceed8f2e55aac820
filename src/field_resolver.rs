//! Label Resolver - maps a free-text field label to a canonical field id.
//!
//! Resolution priority:
//!
//! 1. **Alias table** (zero cost) - case-insensitive exact then substring
//!    match against the static catalog; a hit short-circuits, no network.
//! 2. **Embedding shortlist** - embed the label, rank the precomputed corpus
//!    by cosine similarity, keep the top 5.
//! 3. **LLM disambiguation** - the model picks exactly one of the 5 offered
//!    labels, given the surrounding instruction for context.
//!
//! The resolver CHOOSES from the shortlist, never invents: an answer that is
//! not verbatim one of the offered labels is a contract violation, and the
//! top-similarity candidate is never substituted silently.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::FieldCatalog;
use crate::error::{CoreError, Result};
use crate::llm::{EmbeddingClient, LlmClient};
use crate::similarity::{cosine_similarity, FIELD_SHORTLIST_SIZE};

const DISAMBIGUATION_SYSTEM_PROMPT: &str = "You are a precise assistant that resolves a user's field reference to one of a fixed set of known field labels. \
You must answer with exactly one label from the offered list, verbatim. \
Never explain or justify your answer. Do not return anything else.";

/// A resolved field reference: the canonical label that matched and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub label: String,
    pub field_id: String,
}

/// Resolves human field labels against an immutable catalog.
pub struct FieldResolver {
    catalog: Arc<FieldCatalog>,
    embeddings: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
}

impl FieldResolver {
    pub fn new(
        catalog: Arc<FieldCatalog>,
        embeddings: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            catalog,
            embeddings,
            llm,
        }
    }

    /// Resolve `human_label` to a canonical (label, field id) pair.
    ///
    /// `instruction_context` is the full instruction the label came from;
    /// it is shown to the LLM during disambiguation and also searched for
    /// alias substrings.
    pub async fn resolve_field(
        &self,
        human_label: &str,
        instruction_context: &str,
    ) -> Result<ResolvedField> {
        // Stage 1: alias table, no network
        if let Some((label, id)) = self
            .catalog
            .lookup_exact(human_label)
            .or_else(|| self.catalog.lookup_substring(human_label))
            .or_else(|| self.catalog.lookup_substring(instruction_context))
        {
            debug!(%human_label, label, id, "alias table hit");
            return Ok(ResolvedField {
                label: label.to_string(),
                field_id: id.to_string(),
            });
        }

        // Stage 2: embedding shortlist
        let query = self.embeddings.embed(human_label).await?;
        let shortlist = self.rank_corpus(&query);
        if shortlist.is_empty() {
            return Err(CoreError::upstream(
                "embedding shortlist is empty: no corpus records ranked",
            ));
        }
        debug!(
            %human_label,
            candidates = ?shortlist.iter().map(|(l, _, s)| (l.as_str(), *s)).collect::<Vec<_>>(),
            "embedding shortlist"
        );

        // Stage 3: LLM picks one of the offered labels
        let answer = self
            .llm
            .complete(
                DISAMBIGUATION_SYSTEM_PROMPT,
                &build_disambiguation_prompt(human_label, instruction_context, &shortlist),
            )
            .await?;

        let cleaned = answer.trim().trim_matches('"').trim();
        match shortlist
            .iter()
            .find(|(label, _, _)| label.eq_ignore_ascii_case(cleaned))
        {
            Some((label, id, score)) => {
                debug!(%human_label, label, id, score, "LLM disambiguation accepted");
                Ok(ResolvedField {
                    label: label.clone(),
                    field_id: id.clone(),
                })
            }
            None => {
                warn!(%human_label, %answer, "LLM answered outside the offered shortlist");
                Err(CoreError::contract(format!(
                    "LLM answer '{}' is not among the offered candidate labels",
                    cleaned
                )))
            }
        }
    }

    /// Rank the whole embedding corpus by cosine similarity, top-5.
    fn rank_corpus(&self, query: &[f32]) -> Vec<(String, String, f32)> {
        let mut scored: Vec<(String, String, f32)> = self
            .catalog
            .embeddings()
            .iter()
            .map(|rec| {
                (
                    rec.field_label.clone(),
                    rec.field_id.clone(),
                    cosine_similarity(query, &rec.embedding),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(FIELD_SHORTLIST_SIZE);
        scored
    }
}

fn build_disambiguation_prompt(
    human_label: &str,
    instruction_context: &str,
    shortlist: &[(String, String, f32)],
) -> String {
    let options = shortlist
        .iter()
        .map(|(label, _, _)| format!("- {}", label))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The user referred to a field as: \"{}\"\n\
         Full instruction for context:\n{}\n\n\
         Candidate field labels:\n{}\n\n\
         Answer with exactly one label from the list above, verbatim.",
        human_label, instruction_context, options
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EmbeddingRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub LLM returning a fixed answer and counting invocations.
    struct StubLlm {
        answer: String,
        calls: AtomicUsize,
    }

    impl StubLlm {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    /// Stub embedder returning a fixed vector and counting invocations.
    struct StubEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn returning(vector: Vec<f32>) -> Arc<Self> {
            Arc::new(Self {
                vector,
                calls: AtomicUsize::new(0),
            })
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    fn corpus_catalog() -> Arc<FieldCatalog> {
        // Orthogonal-ish toy vectors: "go live date" is closest to [1, 0]
        let catalog = FieldCatalog::builtin().with_embeddings(vec![
            EmbeddingRecord {
                field_label: "go live date".to_string(),
                field_id: "customfield_10151".to_string(),
                embedding: vec![0.9, 0.1],
            },
            EmbeddingRecord {
                field_label: "project start date".to_string(),
                field_id: "customfield_10150".to_string(),
                embedding: vec![0.5, 0.5],
            },
            EmbeddingRecord {
                field_label: "support mode".to_string(),
                field_id: "customfield_10201".to_string(),
                embedding: vec![0.0, 1.0],
            },
        ]);
        Arc::new(catalog)
    }

    #[tokio::test]
    async fn test_alias_hit_short_circuits_network() {
        let llm = StubLlm::answering("never used");
        let embedder = StubEmbedder::returning(vec![1.0, 0.0]);
        let resolver = FieldResolver::new(corpus_catalog(), embedder.clone(), llm.clone());

        let resolved = resolver
            .resolve_field("Support Mode", "change support mode to L1+L2")
            .await
            .expect("alias hit");

        assert_eq!(resolved.field_id, "customfield_10201");
        assert_eq!(embedder.call_count(), 0, "embedding path must not run");
        assert_eq!(llm.call_count(), 0, "LLM path must not run");
    }

    #[tokio::test]
    async fn test_context_substring_hit_short_circuits() {
        let llm = StubLlm::answering("never used");
        let embedder = StubEmbedder::returning(vec![1.0, 0.0]);
        let resolver = FieldResolver::new(corpus_catalog(), embedder.clone(), llm);

        let resolved = resolver
            .resolve_field("golive", "set the expected go live date to 01/07/2025")
            .await
            .expect("context substring hit");

        assert_eq!(resolved.label, "expected go live date");
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_embedding_path_accepts_shortlist_answer() {
        let llm = StubLlm::answering("Go Live Date");
        let embedder = StubEmbedder::returning(vec![1.0, 0.0]);
        let resolver = FieldResolver::new(corpus_catalog(), embedder.clone(), llm.clone());

        let resolved = resolver
            .resolve_field("launch day", "set launch day to friday")
            .await
            .expect("resolved via LLM");

        assert_eq!(resolved.label, "go live date");
        assert_eq!(resolved.field_id, "customfield_10151");
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_answer_outside_shortlist_is_contract_violation() {
        // The model invents a label; the top-similarity candidate must NOT
        // be substituted silently.
        let llm = StubLlm::answering("due date");
        let embedder = StubEmbedder::returning(vec![1.0, 0.0]);
        let resolver = FieldResolver::new(corpus_catalog(), embedder, llm);

        let err = resolver
            .resolve_field("launch day", "set launch day to friday")
            .await
            .expect_err("must reject");
        assert!(matches!(err, CoreError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_upstream_failure() {
        let llm = StubLlm::answering("anything");
        let embedder = StubEmbedder::returning(vec![1.0, 0.0]);
        let resolver = FieldResolver::new(
            Arc::new(FieldCatalog::builtin()),
            embedder,
            llm,
        );

        let err = resolver
            .resolve_field("launch day", "set launch day to friday")
            .await
            .expect_err("no corpus");
        assert!(matches!(err, CoreError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_embedding_error_propagates() {
        struct FailingEmbedder;
        #[async_trait]
        impl EmbeddingClient for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(CoreError::upstream("embedding service down"))
            }
        }

        let resolver = FieldResolver::new(
            corpus_catalog(),
            Arc::new(FailingEmbedder),
            StubLlm::answering("anything"),
        );
        let err = resolver
            .resolve_field("launch day", "set launch day to friday")
            .await
            .expect_err("propagates");
        assert!(matches!(err, CoreError::Upstream { .. }));
    }
}
