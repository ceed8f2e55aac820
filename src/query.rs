//! Query Synthesizer - turns free-text search intent into JQL.
//!
//! Two routes:
//!
//! - [`synthesize_query`] - LLM-backed: free text plus the live project and
//!   priority allow-lists in, one `{jql, max_results}` JSON object out.
//!   Status language is mapped to resolution clauses, never raw status
//!   names.
//! - [`JqlBuilder`] - deterministic clause assembly from structured filter
//!   parameters, for callers that already know what they want.

use serde_json::Value;
use tracing::debug;

use crate::dates::parse_flexible_date;
use crate::error::{CoreError, Result};
use crate::llm::LlmClient;
use crate::parser::extract_json_object;
use crate::types::QueryIntent;

const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are a Jira assistant that converts natural language requests into structured JSON for querying issues.

RULES:
- Only use the provided project keys and priorities.
- For issue status, DO NOT use raw status names (like 'In Progress', 'To Do', etc).
- Instead, determine the resolution type from the user input:
   - Use 'resolution = Unresolved' for open/incomplete issues
   - Use 'resolution != Unresolved' for closed/completed issues
   - Omit the resolution condition if the user meant 'all' issues
- If a priority is mentioned, use it in a priority clause.
- If no priority is mentioned, omit it.
- If the user input includes a limit (e.g. 'top 10'), extract it as max_results.
- If no limit is mentioned, set max_results to null.
- Return a JSON object ONLY with these fields:
   - jql: string
   - max_results: integer or null
- DO NOT include explanations or markdown, just return the JSON."#;

/// Synthesize a JQL query from free text, constrained by live allow-lists.
pub async fn synthesize_query(
    llm: &dyn LlmClient,
    text: &str,
    allowed_projects: &[String],
    allowed_priorities: &[String],
) -> Result<QueryIntent> {
    let user_message = format!(
        "User Input:\n{}\n\n\
         Allowed project keys:\n{}\n\n\
         Allowed priorities:\n{}\n\n\
         Expected output format:\n\n\
         {{\n  \"jql\": \"<VALID_JQL_STRING>\",\n  \"max_results\": <integer or null>\n}}",
        text,
        allowed_projects.join(", "),
        allowed_priorities.join(", "),
    );

    let raw = llm.complete(SYNTHESIS_SYSTEM_PROMPT, &user_message).await?;
    debug!(raw = %raw, "query synthesizer raw LLM response");
    parse_query_response(&raw)
}

/// Deserialize the raw LLM response into a `QueryIntent`.
pub(crate) fn parse_query_response(raw: &str) -> Result<QueryIntent> {
    let json_str = extract_json_object(raw).ok_or_else(|| {
        CoreError::validation_with_raw("no JSON object found in LLM response", raw)
    })?;

    let parsed: Value = serde_json::from_str(json_str).map_err(|e| {
        CoreError::validation_with_raw(format!("failed to parse query JSON: {}", e), raw)
    })?;

    let obj = parsed
        .as_object()
        .ok_or_else(|| CoreError::validation_with_raw("query response is not an object", raw))?;

    // Both keys must be present; max_results may be null
    let jql = obj
        .get("jql")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation_with_raw("missing or non-string 'jql' key", raw))?;
    let max_results = match obj.get("max_results") {
        None => {
            return Err(CoreError::validation_with_raw(
                "missing 'max_results' key",
                raw,
            ))
        }
        Some(Value::Null) => None,
        Some(v) => {
            let n = v.as_i64().ok_or_else(|| {
                CoreError::validation_with_raw("'max_results' is not an integer", raw)
            })?;
            if n <= 0 {
                return Err(CoreError::validation_with_raw(
                    format!("'max_results' must be positive, got {}", n),
                    raw,
                ));
            }
            Some(n as u32)
        }
    };

    Ok(QueryIntent {
        jql: jql.to_string(),
        max_results,
    })
}

// ---------------------------------------------------------------------------
// Deterministic JQL assembly
// ---------------------------------------------------------------------------

/// Builds a JQL expression from structured filter parameters.
///
/// Multi-valued filters render as `field in ("a","b")` clauses joined with
/// `AND`. Created-date bounds accept anything [`parse_flexible_date`]
/// understands, including relative input like `-2w`.
#[derive(Debug, Clone, Default)]
pub struct JqlBuilder {
    clauses: Vec<String>,
}

impl JqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_clause(mut self, field: &str, values: &[String]) -> Self {
        if !values.is_empty() {
            let quoted = values
                .iter()
                .map(|v| format!("\"{}\"", v))
                .collect::<Vec<_>>()
                .join(",");
            self.clauses.push(format!("{} in ({})", field, quoted));
        }
        self
    }

    pub fn projects(self, keys: &[String]) -> Self {
        self.in_clause("project", keys)
    }

    pub fn assignees(self, names: &[String]) -> Self {
        self.in_clause("assignee", names)
    }

    pub fn statuses(self, names: &[String]) -> Self {
        self.in_clause("status", names)
    }

    pub fn priorities(self, names: &[String]) -> Self {
        self.in_clause("priority", names)
    }

    pub fn issue_types(self, names: &[String]) -> Self {
        self.in_clause("issuetype", names)
    }

    pub fn labels(self, names: &[String]) -> Self {
        self.in_clause("labels", names)
    }

    /// Only open (unresolved) issues.
    pub fn unresolved_only(mut self) -> Self {
        self.clauses.push("resolution = Unresolved".to_string());
        self
    }

    /// Only closed (resolved) issues.
    pub fn resolved_only(mut self) -> Self {
        self.clauses.push("resolution != Unresolved".to_string());
        self
    }

    pub fn created_after(mut self, bound: &str) -> Result<Self> {
        let date = parse_flexible_date(bound)?;
        self.clauses.push(format!("created >= \"{}\"", date));
        Ok(self)
    }

    pub fn created_before(mut self, bound: &str) -> Result<Self> {
        let date = parse_flexible_date(bound)?;
        self.clauses.push(format!("created <= \"{}\"", date));
        Ok(self)
    }

    pub fn build(self) -> String {
        self.clauses.join(" AND ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
