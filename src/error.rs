//! Typed failure taxonomy for the translation core.
//!
//! Every failure maps to exactly one `CoreError` variant:
//!
//! ```text
//! Resolution — no candidate field/entity found locally
//! Validation — value fails schema/enumeration check, or structured
//!              LLM output fails to parse
//! Contract   — LLM output violates the required response contract
//!              (e.g. picks an option outside the offered candidates)
//! Upstream   — schema provider, entity store, embedding provider, or
//!              completion provider error / unexpected shape
//! ```
//!
//! ## Rules
//!
//! - `thiserror` for enum derivation — no manual `Display` impls.
//! - No `.unwrap()` outside tests.
//! - Failures carry human-readable detail; none are ever converted into a
//!   best-effort default value, and nothing in this crate retries.

use serde::{Deserialize, Serialize};

/// All failure modes of the translation core.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "error_kind", rename_all = "snake_case")]
pub enum CoreError {
    /// No matching field or entity could be found locally.
    #[error("Resolution failed: {detail}")]
    Resolution { detail: String },

    /// A value failed the schema/enumeration check, or structured LLM
    /// output could not be parsed. `raw` keeps the unmodified LLM response
    /// for diagnostics when one was involved.
    #[error("Validation failed: {detail}")]
    Validation {
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },

    /// The LLM answered outside the contract it was given.
    #[error("LLM contract violation: {detail}")]
    Contract { detail: String },

    /// An external collaborator errored or returned an unexpected shape.
    #[error("Upstream failure: {detail}")]
    Upstream { detail: String },
}

impl CoreError {
    pub fn resolution(detail: impl Into<String>) -> Self {
        Self::Resolution {
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
            raw: None,
        }
    }

    /// Validation failure with the raw LLM response attached.
    pub fn validation_with_raw(detail: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn contract(detail: impl Into<String>) -> Self {
        Self::Contract {
            detail: detail.into(),
        }
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::Upstream {
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream {
            detail: err.to_string(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// All 4 variants must be constructible and display non-empty detail.
    #[test]
    fn test_all_4_error_kinds_constructible() {
        let variants = vec![
            CoreError::resolution("no matching field for 'go live'"),
            CoreError::validation_with_raw("no JSON object found", "I'm sorry, I can't"),
            CoreError::contract("answer 'Due Date' not among offered candidates"),
            CoreError::upstream("embedding request failed: connection refused"),
        ];

        assert_eq!(variants.len(), 4);
        for v in &variants {
            assert!(!v.to_string().is_empty(), "Display must be non-empty for {:?}", v);
        }
    }

    #[test]
    fn test_serde_round_trip_keeps_raw() {
        let err = CoreError::validation_with_raw("missing 'action' key", "{\"field_label\": \"x\"}");
        let json = serde_json::to_string(&err).expect("serialize");
        assert!(json.contains("\"error_kind\":\"validation\""));
        let back: CoreError = serde_json::from_str(&json).expect("deserialize");
        match back {
            CoreError::Validation { raw, .. } => assert!(raw.is_some()),
            other => panic!("wrong variant: {:?}", other),
        }
    }
}
