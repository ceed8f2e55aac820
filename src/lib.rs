//! LLM-powered translation layer between free-text instructions and a
//! ticketing system of record.
//!
//! The core turns "set support mode to L1+L2" into a precise, schema-valid
//! field update, and "open high priority nordea issues" into a JQL query.
//! It has no database dependencies and no server: transport, credential
//! loading, and read-only ticket extraction live with the callers.
//!
//! ## Architecture
//!
//! ```text
//! update:  text → parser → UpdateIntent → FieldResolver → formatter → store
//! search:  text + live allow-lists → query synthesizer → QueryIntent
//! ```
//!
//! External services (completion, embedding, schema, store) are injectable
//! capability traits so every algorithm can be tested against fixed stubs.
//! The core never retries, never picks a default when ambiguity cannot be
//! resolved, and never commits a partial write.

pub mod catalog;
pub mod dates;
pub mod entity_resolver;
pub mod error;
pub mod field_resolver;
pub mod formatter;
pub mod jira;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod similarity;
pub mod types;

// Re-exports for convenience
pub use catalog::{EmbeddingRecord, FieldCatalog};
pub use entity_resolver::EntityResolver;
pub use error::{CoreError, Result};
pub use field_resolver::{FieldResolver, ResolvedField};
pub use formatter::format_value;
pub use jira::{EntityStore, JiraClient, SchemaProvider};
pub use llm::{EmbeddingClient, LlmClient, OpenAiClient};
pub use parser::parse_update;
pub use pipeline::CharterService;
pub use query::{synthesize_query, JqlBuilder};
pub use similarity::{JaroWinkler, SimilarityScorer};
pub use types::{
    EntityCandidate, FieldSchema, FieldType, FormattedValue, IntentValue, QueryIntent,
    UpdateAction, UpdateIntent, UpdateOutcome,
};
