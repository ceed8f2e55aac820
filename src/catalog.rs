//! Field catalog: static alias table + precomputed embedding corpus.
//!
//! Both are loaded once at startup and passed explicitly into the resolvers;
//! the catalog is immutable for the life of the process. There is no reload
//! protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Built-in alias table: human label variant (lower-cased) → canonical field
/// id. Many labels map to the same field.
static DEFAULT_ALIASES: &[(&str, &str)] = &[
    // Project + timing
    ("deployment type", "customfield_10149"),
    ("project start date", "customfield_10150"),
    ("expected project start date", "customfield_10150"),
    ("go live date", "customfield_10151"),
    ("expected go live date", "customfield_10151"),
    // Service submodules
    ("cffc services included", "customfield_10154"),
    ("identity submodules", "customfield_10208"),
    ("threats submodules", "customfield_10209"),
    ("payments submodules", "customfield_10210"),
    // Web traffic
    ("web impressions per day", "customfield_10158"),
    ("web impressions per minute", "customfield_10159"),
    ("web peak impressions per day", "customfield_10160"),
    ("web peak impressions per minute", "customfield_10161"),
    // Landing page traffic
    ("landing page impressions per day", "customfield_10184"),
    ("landing page impressions per minute", "customfield_10185"),
    ("landing page peak impressions per day", "customfield_10186"),
    ("landing page peak impressions per minute", "customfield_10187"),
    // Mobile traffic
    ("mobile impressions per day", "customfield_10188"),
    ("mobile impressions per minute", "customfield_10189"),
    ("mobile peak impressions per day", "customfield_10190"),
    ("mobile peak impressions per minute", "customfield_10191"),
    // Performance / SLAs
    ("requested max api response time", "customfield_10192"),
    ("number of protected users", "customfield_10193"),
    ("total active users to be protected", "customfield_10193"),
    ("requested data retention", "customfield_10195"),
    ("disaster recovery", "customfield_10199"),
    ("dr", "customfield_10199"),
    ("support mode", "customfield_10201"),
    // SLA timers
    ("critical priority reaction time", "customfield_10248"),
    ("high priority reaction time", "customfield_10249"),
    ("medium priority reaction time", "customfield_10250"),
    ("low priority reaction time", "customfield_10251"),
    ("security incident reporting time", "customfield_10252"),
    ("critical priority fix time", "customfield_10253"),
    ("high priority fix time", "customfield_10254"),
    ("medium priority fix time", "customfield_10255"),
    ("low priority fix time", "customfield_10256"),
    ("security incident fix proposal time", "customfield_10257"),
    // Vulnerability metrics
    ("significant vulnerability mitigating time", "customfield_10258"),
    ("insignificant vulnerability mitigating time", "customfield_10259"),
    ("significant vulnerability fixing time", "customfield_10260"),
    ("insignificant vulnerability fixing time", "customfield_10261"),
    ("security incident fix implemented", "customfield_10262"),
    ("insignificant vulnerability reporting time", "customfield_10263"),
    ("insignificant vulnerability analysis plan", "customfield_10264"),
    ("significant vulnerability reporting time", "customfield_10265"),
    ("significant vulnerability analysis plan", "customfield_10266"),
    // Contacts
    ("client´s name", "customfield_10145"),
    ("client´s country", "customfield_10146"),
    ("client´s project spoc name", "customfield_10147"),
    ("client´s project spoc email", "customfield_10148"),
    ("spoc name", "customfield_10147"),
    ("spoc email", "customfield_10148"),
    ("partner´s name", "customfield_10178"),
    ("partner´s country", "customfield_10221"),
    ("partner´s spoc", "customfield_10183"),
    ("integrator´s name", "customfield_10181"),
    ("integrator´s country", "customfield_10220"),
    ("integrator´s spoc", "customfield_10183"),
    // Distribution
    ("distribution type", "customfield_10176"),
    // Other / generic
    ("signed nda url", "customfield_10238"),
    ("nda url", "customfield_10238"),
    ("number of test environments", "customfield_10240"),
    ("project milestones", "customfield_10204"),
    ("other notes", "customfield_10200"),
    ("customer", "customfield_10046"),
];

/// One precomputed embedding for a field label. The corpus file is the
/// output of the offline embedding generator (one record per alias).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub field_label: String,
    pub field_id: String,
    pub embedding: Vec<f32>,
}

/// Immutable field catalog constructed once at process start.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    /// Lower-cased alias → field id.
    aliases: HashMap<String, String>,
    embeddings: Vec<EmbeddingRecord>,
}

impl FieldCatalog {
    /// Catalog with the built-in alias table and no embedding corpus.
    pub fn builtin() -> Self {
        let aliases = DEFAULT_ALIASES
            .iter()
            .map(|(label, id)| (label.to_string(), id.to_string()))
            .collect();
        Self {
            aliases,
            embeddings: Vec::new(),
        }
    }

    /// Catalog from explicit alias pairs (labels are lower-cased on entry).
    pub fn from_aliases(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let aliases = pairs
            .into_iter()
            .map(|(label, id)| (label.to_lowercase(), id))
            .collect();
        Self {
            aliases,
            embeddings: Vec::new(),
        }
    }

    /// Attach a precomputed embedding corpus.
    pub fn with_embeddings(mut self, embeddings: Vec<EmbeddingRecord>) -> Self {
        self.embeddings = embeddings;
        self
    }

    /// Load the embedding corpus from a JSON file
    /// (`[{field_label, field_id, embedding}, …]`).
    pub fn load_embeddings(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::upstream(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.embeddings = serde_json::from_str(&raw).map_err(|e| {
            CoreError::upstream(format!("malformed embedding corpus {}: {}", path.display(), e))
        })?;
        tracing::info!(
            count = self.embeddings.len(),
            path = %path.display(),
            "loaded field embedding corpus"
        );
        Ok(self)
    }

    /// Exact alias lookup on the lower-cased label.
    pub fn lookup_exact(&self, label: &str) -> Option<(&str, &str)> {
        let key = label.trim().to_lowercase();
        self.aliases
            .get_key_value(key.as_str())
            .map(|(l, id)| (l.as_str(), id.as_str()))
    }

    /// Substring alias lookup: the longest alias contained in `text` wins.
    /// Longest-first keeps "expected go live date" from losing to "dr".
    pub fn lookup_substring(&self, text: &str) -> Option<(&str, &str)> {
        let haystack = text.to_lowercase();
        self.aliases
            .iter()
            .filter(|(alias, _)| haystack.contains(alias.as_str()))
            .max_by_key(|(alias, _)| alias.len())
            .map(|(alias, id)| (alias.as_str(), id.as_str()))
    }

    pub fn embeddings(&self) -> &[EmbeddingRecord] {
        &self.embeddings
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_exact_lookup_is_case_insensitive() {
        let catalog = FieldCatalog::builtin();
        let (label, id) = catalog.lookup_exact("Support Mode").expect("known alias");
        assert_eq!(label, "support mode");
        assert_eq!(id, "customfield_10201");
    }

    #[test]
    fn test_aliases_share_field_ids() {
        let catalog = FieldCatalog::builtin();
        let (_, a) = catalog.lookup_exact("go live date").expect("alias");
        let (_, b) = catalog.lookup_exact("expected go live date").expect("alias");
        assert_eq!(a, b);
    }

    #[test]
    fn test_substring_lookup_prefers_longest_alias() {
        let catalog = FieldCatalog::builtin();
        let (label, id) = catalog
            .lookup_substring("set the expected go live date to next friday")
            .expect("substring hit");
        assert_eq!(label, "expected go live date");
        assert_eq!(id, "customfield_10151");
    }

    #[test]
    fn test_substring_miss_returns_none() {
        let catalog = FieldCatalog::builtin();
        assert!(catalog.lookup_substring("bump the flux capacitor").is_none());
    }

    #[test]
    fn test_embedding_record_deserializes_corpus_shape() {
        let raw = r#"[{"field_label": "go live date", "field_id": "customfield_10151",
                       "embedding": [0.1, -0.2, 0.3]}]"#;
        let records: Vec<EmbeddingRecord> = serde_json::from_str(raw).expect("corpus");
        assert_eq!(records[0].field_id, "customfield_10151");
        assert_eq!(records[0].embedding.len(), 3);
    }
}
