//! Composite update pipeline.
//!
//! ```text
//! instruction text → parse_update → UpdateIntent
//!                         ↓
//!              FieldResolver (+ schema lookup)
//!                         ↓
//!        (current-value read, array fields only)
//!                         ↓
//!                   format_value → write_fields
//! ```
//!
//! All-or-nothing: a failure at any stage returns before the write is
//! issued, so the store never sees a partial or unvalidated payload. The
//! read-then-write on array fields has no transaction discipline here;
//! concurrent writers race and the store's last write wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::catalog::FieldCatalog;
use crate::entity_resolver::EntityResolver;
use crate::error::{CoreError, Result};
use crate::field_resolver::{FieldResolver, ResolvedField};
use crate::formatter::format_value;
use crate::jira::{EntityStore, SchemaProvider};
use crate::llm::{EmbeddingClient, LlmClient};
use crate::parser::parse_update;
use crate::query::synthesize_query;
use crate::similarity::{JaroWinkler, SimilarityScorer};
use crate::types::{
    EntityCandidate, FieldType, QueryIntent, UpdateIntent, UpdateOutcome,
};

/// Top-level service wiring the injectable capabilities together.
///
/// Single-threaded request/response: one inbound instruction yields at most
/// one outbound effect. The catalog is the only long-lived state and is
/// read-only.
pub struct CharterService {
    llm: Arc<dyn LlmClient>,
    schema_provider: Arc<dyn SchemaProvider>,
    store: Arc<dyn EntityStore>,
    scorer: Arc<dyn SimilarityScorer>,
    field_resolver: FieldResolver,
    entity_resolver: EntityResolver,
}

impl CharterService {
    pub fn new(
        catalog: Arc<FieldCatalog>,
        llm: Arc<dyn LlmClient>,
        embeddings: Arc<dyn EmbeddingClient>,
        schema_provider: Arc<dyn SchemaProvider>,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        let scorer: Arc<dyn SimilarityScorer> = Arc::new(JaroWinkler);
        let field_resolver = FieldResolver::new(catalog, embeddings, llm.clone());
        let entity_resolver = EntityResolver::new(llm.clone(), scorer.clone());
        Self {
            llm,
            schema_provider,
            store,
            scorer,
            field_resolver,
            entity_resolver,
        }
    }

    /// Parse a free-text update instruction into a structured intent.
    pub async fn parse_update(&self, text: &str) -> Result<UpdateIntent> {
        parse_update(self.llm.as_ref(), text).await
    }

    /// Resolve a human field label to its canonical (label, id) pair.
    pub async fn resolve_field(
        &self,
        human_label: &str,
        instruction_context: &str,
    ) -> Result<ResolvedField> {
        self.field_resolver
            .resolve_field(human_label, instruction_context)
            .await
    }

    /// Resolve a free-text entity reference against the live project list.
    pub async fn resolve_entity(&self, human_input: &str) -> Result<Vec<String>> {
        let candidates = self.store.projects().await?;
        self.entity_resolver
            .resolve_entity(human_input, &candidates)
            .await
    }

    /// Resolve a free-text entity reference against an explicit candidate
    /// set.
    pub async fn resolve_entity_among(
        &self,
        human_input: &str,
        candidates: &[EntityCandidate],
    ) -> Result<Vec<String>> {
        self.entity_resolver
            .resolve_entity(human_input, candidates)
            .await
    }

    /// Synthesize a JQL query from free text under the live allow-lists.
    pub async fn synthesize_query(&self, text: &str) -> Result<QueryIntent> {
        let projects = self
            .store
            .projects()
            .await?
            .into_iter()
            .map(|p| p.key)
            .collect::<Vec<_>>();
        let priorities = self.store.priorities().await?;
        synthesize_query(self.llm.as_ref(), text, &projects, &priorities).await
    }

    /// Apply a free-text update instruction to a ticket.
    ///
    /// Sequences parse → resolve → schema lookup → current-value read (array
    /// fields only) → format → write, aborting before the write on the
    /// first failure.
    pub async fn apply_update(&self, ticket_key: &str, instruction: &str) -> Result<UpdateOutcome> {
        let intent = self.parse_update(instruction).await?;

        let resolved = self
            .resolve_field(&intent.field_label, instruction)
            .await?;

        let schemas = self.schema_provider.field_schemas(ticket_key).await?;
        let schema = schemas.get(&resolved.field_id).ok_or_else(|| {
            CoreError::validation(format!(
                "field {} ({}) does not belong to the schema of {}",
                resolved.field_id, resolved.label, ticket_key
            ))
        })?;

        let current_values = if schema.field_type == FieldType::ArrayOfOption {
            let raw = self.store.read_field(ticket_key, &resolved.field_id).await?;
            extract_option_values(&raw)
        } else {
            Vec::new()
        };

        let formatted = format_value(
            self.scorer.as_ref(),
            schema,
            &intent.value,
            &current_values,
            intent.action,
        )?;

        let mut fields = HashMap::new();
        fields.insert(resolved.field_id.clone(), formatted.to_payload());
        self.store.write_fields(ticket_key, fields).await?;

        info!(
            ticket = %ticket_key,
            field = %resolved.label,
            field_id = %resolved.field_id,
            action = %intent.action,
            "field updated"
        );

        Ok(UpdateOutcome {
            ticket: ticket_key.to_string(),
            field_label: resolved.label,
            field_id: resolved.field_id,
            new_value: formatted.display_value(),
            action: intent.action,
        })
    }
}

/// Pull the plain option strings out of a stored multi-select value
/// (`[{"value": v}, …]`). Anything else yields an empty set.
pub(crate) fn extract_option_values(raw: &Value) -> Vec<String> {
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["value"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
