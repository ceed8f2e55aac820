//! Entity Resolver - maps free-text entity references to canonical keys.
//!
//! Candidates come live from the system of record as {key, name} pairs.
//! A fuzzy pass shortlists similar names, then the LLM selects the matching
//! key(s) from the shortlist only, as a literal comma-separated list. Every
//! returned key is validated against the shortlist; one invalid key rejects
//! the entire result rather than silently dropping it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::llm::LlmClient;
use crate::similarity::{
    shortlist, SimilarityScorer, ENTITY_SHORTLIST_SIZE, ENTITY_SHORTLIST_THRESHOLD,
};
use crate::types::EntityCandidate;

const SELECTION_SYSTEM_PROMPT: &str = "You are a precise assistant that helps resolve project keys from user input. \
You are expected to return a comma-separated list of matching project keys ONLY. \
Never explain or justify your answer. Do not return anything else.";

/// Resolves free-text entity references against a live candidate set.
pub struct EntityResolver {
    llm: Arc<dyn LlmClient>,
    scorer: Arc<dyn SimilarityScorer>,
}

impl EntityResolver {
    pub fn new(llm: Arc<dyn LlmClient>, scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self { llm, scorer }
    }

    /// Resolve `human_input` to one or more candidate keys.
    pub async fn resolve_entity(
        &self,
        human_input: &str,
        candidates: &[EntityCandidate],
    ) -> Result<Vec<String>> {
        let filtered = shortlist(
            self.scorer.as_ref(),
            human_input,
            candidates.iter(),
            |c| c.name.as_str(),
            ENTITY_SHORTLIST_THRESHOLD,
            ENTITY_SHORTLIST_SIZE,
        );

        if filtered.is_empty() {
            return Err(CoreError::resolution(format!(
                "no similar names found for '{}'",
                human_input
            )));
        }
        debug!(
            %human_input,
            shortlist = ?filtered
                .iter()
                .map(|c| (c.item.key.as_str(), c.score))
                .collect::<Vec<_>>(),
            "entity shortlist"
        );

        let answer = self
            .llm
            .complete(
                SELECTION_SYSTEM_PROMPT,
                &build_selection_prompt(human_input, &filtered),
            )
            .await?;

        let selected: Vec<String> = answer
            .split(',')
            .map(|k| k.trim().trim_matches('"').to_uppercase())
            .filter(|k| !k.is_empty())
            .collect();

        if selected.is_empty() {
            return Err(CoreError::contract(format!(
                "LLM returned no keys for '{}'",
                human_input
            )));
        }

        let valid_keys: Vec<&str> = filtered.iter().map(|c| c.item.key.as_str()).collect();
        let invalid: Vec<&String> = selected
            .iter()
            .filter(|k| !valid_keys.contains(&k.as_str()))
            .collect();
        if !invalid.is_empty() {
            warn!(%human_input, ?invalid, "LLM returned keys outside the candidate set");
            return Err(CoreError::contract(format!(
                "LLM returned invalid keys: {:?}",
                invalid
            )));
        }

        Ok(selected)
    }
}

fn build_selection_prompt(
    human_input: &str,
    filtered: &[crate::similarity::ScoredCandidate<&EntityCandidate>],
) -> String {
    let options = filtered
        .iter()
        .map(|c| format!("- {} (key: {})", c.item.name, c.item.key))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The user provided this input: \"{}\"\n\n\
         Here are possible options:\n{}\n\n\
         From the list above, identify the entity or entities referred to in the input.\n\
         Respond with a comma-separated list of the matching keys ONLY, such as:\n\n\
         ASUCIT, CFFCSDUCIT\n\n\
         Do not include any other text, comments, or formatting.",
        human_input, options
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::JaroWinkler;
    use async_trait::async_trait;

    struct StubLlm(String);

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn resolver(answer: &str) -> EntityResolver {
        EntityResolver::new(
            Arc::new(StubLlm(answer.to_string())),
            Arc::new(JaroWinkler),
        )
    }

    fn projects() -> Vec<EntityCandidate> {
        vec![
            EntityCandidate {
                key: "NORD".to_string(),
                name: "Nordea Rollout".to_string(),
            },
            EntityCandidate {
                key: "SLSP".to_string(),
                name: "SLSP Core".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_resolves_single_key() {
        let keys = resolver("NORD")
            .resolve_entity("nordea project", &projects())
            .await
            .expect("resolved");
        assert_eq!(keys, vec!["NORD"]);
    }

    #[tokio::test]
    async fn test_lowercase_answer_is_normalized() {
        let keys = resolver(" nord ")
            .resolve_entity("nordea project", &projects())
            .await
            .expect("resolved");
        assert_eq!(keys, vec!["NORD"]);
    }

    #[tokio::test]
    async fn test_invalid_key_rejects_entire_result() {
        // One valid key plus one invented key: the whole call fails
        let err = resolver("NORD, XYZ")
            .resolve_entity("nordea project", &projects())
            .await
            .expect_err("must reject");
        assert!(matches!(err, CoreError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_no_similar_names_is_resolution_failure() {
        let err = resolver("NORD")
            .resolve_entity("zzz9qq", &projects())
            .await
            .expect_err("no shortlist");
        assert!(matches!(err, CoreError::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_empty_answer_is_contract_violation() {
        let err = resolver("  ")
            .resolve_entity("nordea project", &projects())
            .await
            .expect_err("empty answer");
        assert!(matches!(err, CoreError::Contract { .. }));
    }
}
