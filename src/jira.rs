//! Jira REST client - the concrete system of record.
//!
//! Implements the two capability traits the pipeline consumes:
//!
//! - [`SchemaProvider`] - create-meta field definitions for a ticket's
//!   project / issue-type pair, parsed into [`FieldSchema`].
//! - [`EntityStore`] - current field reads, field writes (PUT, 204 on
//!   success), and the live allow-lists (projects, priorities, statuses).
//!
//! Calls are single blocking round-trips; retries, timeouts, and rate
//! limiting are the caller's responsibility.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::types::{EntityCandidate, FieldSchema, FieldType};

/// Field schema lookup for the entity type a ticket belongs to.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Map of field id → schema for the given ticket.
    async fn field_schemas(&self, ticket_key: &str) -> Result<HashMap<String, FieldSchema>>;
}

/// Read/write access to tickets plus the live allow-lists.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Current raw value of one field on a ticket.
    async fn read_field(&self, ticket_key: &str, field_id: &str) -> Result<Value>;

    /// Write field values. All-or-nothing at the provider.
    async fn write_fields(&self, ticket_key: &str, fields: HashMap<String, Value>) -> Result<()>;

    /// Live {key, name} project candidates.
    async fn projects(&self) -> Result<Vec<EntityCandidate>>;

    /// Live priority names.
    async fn priorities(&self) -> Result<Vec<String>>;

    /// Live status names.
    async fn statuses(&self) -> Result<Vec<String>>;
}

/// Jira Cloud REST API v3 client with basic auth.
#[derive(Clone)]
pub struct JiraClient {
    base_url: String,
    email: String,
    api_token: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: String, email: String, api_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token,
            client: reqwest::Client::new(),
        }
    }

    /// Create from `JIRA_BASE_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| CoreError::upstream(format!("{} environment variable not set", name)))
        };
        Ok(Self::new(
            var("JIRA_BASE_URL")?,
            var("JIRA_EMAIL")?,
            var("JIRA_API_TOKEN")?,
        ))
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::upstream(format!(
                "GET {} failed with status {}: {}",
                path, status, body
            )));
        }
        Ok(response
            .json()
            .await
            .map_err(|e| CoreError::upstream(format!("malformed response from {}: {}", path, e)))?)
    }

    /// (project key, issue type name) for a ticket.
    async fn issue_context(&self, ticket_key: &str) -> Result<(String, String)> {
        let data = self
            .get_json(&format!("/rest/api/3/issue/{}", ticket_key), &[])
            .await?;
        let project_key = data["fields"]["project"]["key"]
            .as_str()
            .ok_or_else(|| CoreError::upstream("issue response missing project key"))?
            .to_string();
        let issue_type = data["fields"]["issuetype"]["name"]
            .as_str()
            .ok_or_else(|| CoreError::upstream("issue response missing issue type"))?
            .to_string();
        Ok((project_key, issue_type))
    }

    fn string_list(&self, data: &Value, name_key: &str) -> Vec<String> {
        data.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item[name_key].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse a create-meta response into field schemas for one issue type.
///
/// The issue type name compares case-insensitively, mirroring the
/// provider's own behavior.
pub(crate) fn parse_createmeta(
    data: &Value,
    issue_type_name: &str,
) -> Result<HashMap<String, FieldSchema>> {
    let projects = data["projects"]
        .as_array()
        .ok_or_else(|| CoreError::upstream("create-meta response missing 'projects'"))?;

    for project in projects {
        let issue_types = project["issuetypes"].as_array().into_iter().flatten();
        for issue_type in issue_types {
            let name = issue_type["name"].as_str().unwrap_or_default();
            if !name.eq_ignore_ascii_case(issue_type_name) {
                continue;
            }
            let fields = issue_type["fields"]
                .as_object()
                .ok_or_else(|| CoreError::upstream("create-meta issue type missing 'fields'"))?;

            let mut schemas = HashMap::with_capacity(fields.len());
            for (field_id, def) in fields {
                let field_type = FieldType::from_schema_parts(
                    def["schema"]["type"].as_str().unwrap_or_default(),
                    def["schema"]["items"].as_str(),
                );
                let allowed_values = def["allowedValues"]
                    .as_array()
                    .map(|opts| {
                        opts.iter()
                            .filter_map(|opt| opt["value"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                schemas.insert(
                    field_id.clone(),
                    FieldSchema {
                        field_id: field_id.clone(),
                        field_type,
                        allowed_values,
                    },
                );
            }
            return Ok(schemas);
        }
    }

    Err(CoreError::upstream(format!(
        "no matching issue type '{}' in create-meta response",
        issue_type_name
    )))
}

#[async_trait]
impl SchemaProvider for JiraClient {
    async fn field_schemas(&self, ticket_key: &str) -> Result<HashMap<String, FieldSchema>> {
        let (project_key, issue_type) = self.issue_context(ticket_key).await?;
        debug!(%ticket_key, %project_key, %issue_type, "fetching create-meta");
        let data = self
            .get_json(
                "/rest/api/3/issue/createmeta",
                &[
                    ("projectKeys", project_key.as_str()),
                    ("expand", "projects.issuetypes.fields"),
                ],
            )
            .await?;
        parse_createmeta(&data, &issue_type)
    }
}

#[async_trait]
impl EntityStore for JiraClient {
    async fn read_field(&self, ticket_key: &str, field_id: &str) -> Result<Value> {
        let data = self
            .get_json(&format!("/rest/api/3/issue/{}", ticket_key), &[])
            .await?;
        Ok(data["fields"][field_id].clone())
    }

    async fn write_fields(&self, ticket_key: &str, fields: HashMap<String, Value>) -> Result<()> {
        let payload = serde_json::json!({ "fields": fields });
        debug!(%ticket_key, %payload, "writing fields");

        let response = self
            .client
            .put(format!("{}/rest/api/3/issue/{}", self.base_url, ticket_key))
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::upstream(format!(
                "update failed with status {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn projects(&self) -> Result<Vec<EntityCandidate>> {
        let data = self.get_json("/rest/api/3/project", &[]).await?;
        let projects = data
            .as_array()
            .ok_or_else(|| CoreError::upstream("project list response is not an array"))?
            .iter()
            .filter_map(|p| {
                Some(EntityCandidate {
                    key: p["key"].as_str()?.to_string(),
                    name: p["name"].as_str()?.to_string(),
                })
            })
            .collect();
        Ok(projects)
    }

    async fn priorities(&self) -> Result<Vec<String>> {
        let data = self.get_json("/rest/api/3/priority", &[]).await?;
        Ok(self.string_list(&data, "name"))
    }

    async fn statuses(&self) -> Result<Vec<String>> {
        let data = self.get_json("/rest/api/3/status", &[]).await?;
        Ok(self.string_list(&data, "name"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
