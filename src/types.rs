//! Core data model: field schemas, update/query intents, formatted values.
//!
//! These are the structures flowing between the instruction parser, the
//! resolvers, the value formatter, and the system-of-record client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// Field value type, as reported by the schema provider.
///
/// Jira's create-meta expresses multi-select enumerations as
/// `type: "array", items: "option"` — that pair collapses to
/// [`FieldType::ArrayOfOption`] at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Single-select enumerated attribute.
    Option,
    /// Single-select with a cascading child option.
    OptionWithChild,
    /// Multi-select enumerated attribute with set semantics.
    ArrayOfOption,
    Date,
    String,
    Number,
    /// Anything the formatter does not recognize; passed through unchanged.
    #[serde(untagged)]
    Other(String),
}

impl FieldType {
    /// Parse the create-meta `schema.type` / `schema.items` pair.
    pub fn from_schema_parts(field_type: &str, items: Option<&str>) -> Self {
        match (field_type, items) {
            ("option", _) => FieldType::Option,
            ("option-with-child", _) => FieldType::OptionWithChild,
            ("array", Some("option")) => FieldType::ArrayOfOption,
            ("date", _) => FieldType::Date,
            ("string", _) => FieldType::String,
            ("number", _) => FieldType::Number,
            (other, _) => FieldType::Other(other.to_string()),
        }
    }
}

/// Per-field metadata for one entity type. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Canonical field identifier (e.g. `customfield_10154`). Opaque.
    pub field_id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Enumerated values, in provider order. Empty for non-enumerated types.
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

impl FieldSchema {
    pub fn new(field_id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_id: field_id.into(),
            field_type,
            allowed_values: Vec::new(),
        }
    }

    pub fn with_allowed_values(mut self, values: Vec<String>) -> Self {
        self.allowed_values = values;
        self
    }
}

// ---------------------------------------------------------------------------
// Update intent
// ---------------------------------------------------------------------------

/// How a requested value combines with the field's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    /// Overwrite: the result is exactly this call's matched values.
    Replace,
    /// Union into the current set. Idempotent.
    Add,
    /// Discard from the current set. Absent elements are a no-op.
    Remove,
}

impl std::fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateAction::Replace => "replace",
            UpdateAction::Add => "add",
            UpdateAction::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// Requested value extracted from the instruction: a single string, a list,
/// or null (clear the field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntentValue {
    Null,
    One(String),
    Many(Vec<String>),
}

impl IntentValue {
    pub fn is_null(&self) -> bool {
        matches!(self, IntentValue::Null)
    }

    /// Coerce to a list; a scalar becomes a one-element list.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            IntentValue::Null => Vec::new(),
            IntentValue::One(v) => vec![v.clone()],
            IntentValue::Many(vs) => vs.clone(),
        }
    }
}

/// Structured update intent parsed from a free-text instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIntent {
    /// Human label of the field being updated (not yet resolved).
    pub field_label: String,
    pub value: IntentValue,
    pub action: UpdateAction,
}

// ---------------------------------------------------------------------------
// Query intent
// ---------------------------------------------------------------------------

/// Structured search intent produced by the query synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Formal JQL filter expression.
    pub jql: String,
    /// Result cap, when the user asked for one ("top 10").
    pub max_results: Option<u32>,
}

// ---------------------------------------------------------------------------
// Formatted values
// ---------------------------------------------------------------------------

/// Schema-valid value ready for the entity store's write API.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedValue {
    /// Single selected option: serializes as `{"value": v}`.
    Option(String),
    /// Multi-select set, always sorted: serializes as `[{"value": v}, …]`.
    Options(Vec<String>),
    /// Canonical ISO date string.
    Date(String),
    /// Pass-through for string/number/unknown types.
    Raw(Value),
}

impl FormattedValue {
    /// Wire shape expected by the system of record.
    pub fn to_payload(&self) -> Value {
        match self {
            FormattedValue::Option(v) => serde_json::json!({ "value": v }),
            FormattedValue::Options(vs) => Value::Array(
                vs.iter()
                    .map(|v| serde_json::json!({ "value": v }))
                    .collect(),
            ),
            FormattedValue::Date(d) => Value::String(d.clone()),
            FormattedValue::Raw(v) => v.clone(),
        }
    }

    /// Human-readable resolved value for logging and responses.
    pub fn display_value(&self) -> Value {
        match self {
            FormattedValue::Option(v) => Value::String(v.clone()),
            FormattedValue::Options(vs) => {
                Value::Array(vs.iter().cloned().map(Value::String).collect())
            }
            FormattedValue::Date(d) => Value::String(d.clone()),
            FormattedValue::Raw(v) => v.clone(),
        }
    }

    /// Build the sorted multi-select variant from a working set.
    pub fn from_option_set(set: BTreeSet<String>) -> Self {
        FormattedValue::Options(set.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Entity candidates
// ---------------------------------------------------------------------------

/// One live {key, name} pair from the system of record (e.g. a project).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub key: String,
    pub name: String,
}

/// Outcome of a committed field update, returned by the composite pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub ticket: String,
    /// Canonical label the human reference resolved to.
    pub field_label: String,
    pub field_id: String,
    /// Final resolved value as written.
    pub new_value: Value,
    pub action: UpdateAction,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
