//! Salesforce REST client.
//!
//! Five operations against the `services/data` API, all bearer-authenticated
//! and single-attempt. Credentials are read from the backend on every call,
//! so a missing token fails with `CredentialsMissing` before any HTTP
//! request goes out. Query failures surface Salesforce's first reported
//! error message; create/update transport errors propagate unwrapped.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::CredentialBackend;
use crate::error::{AssistantError, Result};

const API_VERSION: &str = "v55.0";

/// Result of a SOQL query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DescribeGlobal {
    sobjects: Vec<SObjectSummary>,
}

#[derive(Debug, Deserialize)]
struct SObjectSummary {
    name: String,
    #[serde(default)]
    queryable: bool,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

/// One element of Salesforce's error-array response body.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Extract the first error message from a Salesforce error-array body.
fn first_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Vec<ApiError>>(body)
        .ok()
        .and_then(|errors| errors.into_iter().next())
        .map(|e| e.message)
}

fn queryable_names(describe: DescribeGlobal) -> Vec<String> {
    describe
        .sobjects
        .into_iter()
        .filter(|obj| obj.queryable)
        .map(|obj| obj.name)
        .collect()
}

/// The CRM surface the pipeline depends on. Mocked in pipeline tests.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Names of all queryable object types.
    async fn list_queryable_types(&self) -> Result<Vec<String>>;
    /// Full field/metadata description of one object type.
    async fn describe_type(&self, object_name: &str) -> Result<Value>;
    /// Execute a SOQL statement.
    async fn run_query(&self, soql: &str) -> Result<QueryResult>;
    /// Create a record, returning the new record id.
    async fn create_record(&self, object_name: &str, fields: &Map<String, Value>)
        -> Result<String>;
    /// Update fields on an existing record.
    async fn update_record(
        &self,
        object_name: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()>;
}

pub struct RestClient {
    credentials: Arc<dyn CredentialBackend>,
    http: Client,
}

impl RestClient {
    pub fn new(credentials: Arc<dyn CredentialBackend>) -> Self {
        Self {
            credentials,
            http: Client::new(),
        }
    }

    /// Load credentials and return `(token, base_url)` for this call.
    fn auth(&self) -> Result<(String, String)> {
        let creds = self.credentials.load()?;
        let (token, instance) = creds.salesforce()?;
        let base = format!("{}/services/data/{}", instance, API_VERSION);
        Ok((token.to_string(), base))
    }
}

#[async_trait]
impl CrmApi for RestClient {
    async fn list_queryable_types(&self) -> Result<Vec<String>> {
        let (token, base) = self.auth()?;
        let response = self
            .http
            .get(format!("{}/sobjects", base))
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?;

        let describe: DescribeGlobal = response.json().await?;
        Ok(queryable_names(describe))
    }

    async fn describe_type(&self, object_name: &str) -> Result<Value> {
        let (token, base) = self.auth()?;
        let response = self
            .http
            .get(format!("{}/sobjects/{}/describe", base, object_name))
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn run_query(&self, soql: &str) -> Result<QueryResult> {
        let (token, base) = self.auth()?;
        tracing::debug!(soql, "executing SOQL");
        let response = self
            .http
            .get(format!("{}/query", base))
            .query(&[("q", soql)])
            .bearer_auth(&token)
            .send()
            .await?;

        if let Err(status_err) = response.error_for_status_ref() {
            let body = response.text().await.unwrap_or_default();
            return match first_error_message(&body) {
                Some(message) => Err(AssistantError::QueryExecution(message)),
                None => Err(status_err.into()),
            };
        }

        Ok(response.json().await?)
    }

    async fn create_record(
        &self,
        object_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<String> {
        let (token, base) = self.auth()?;
        tracing::debug!(object_name, "creating record");
        let response = self
            .http
            .post(format!("{}/sobjects/{}", base, object_name))
            .bearer_auth(&token)
            .json(fields)
            .send()
            .await?
            .error_for_status()?;

        let created: CreateResponse = response.json().await?;
        Ok(created.id)
    }

    async fn update_record(
        &self,
        object_name: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let (token, base) = self.auth()?;
        tracing::debug!(object_name, record_id, "updating record");
        self.http
            .patch(format!("{}/sobjects/{}/{}", base, object_name, record_id))
            .bearer_auth(&token)
            .json(fields)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
