//! Generation API Client
//!
//! The `GenerationApi` trait is the seam between the lifecycle machinery
//! and the remote service; tests substitute scripted fakes.
//! `HttpGenerationClient` is the production implementation over reqwest.
//! Neither call is ever retried here: submission failures surface to the
//! caller, and the poll loop treats a failed query as terminal.

use async_trait::async_trait;
use tracing::debug;

use super::protocol::{ApiEnvelope, JobRequest, JobStatus, StatusData, SubmitBody, SubmitData};

/// Error types for job submission
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service rejected the request content
    #[error("Request rejected: {0}")]
    Validation(String),

    /// The response did not match the wire contract
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Error types for status queries
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The response did not match the wire contract
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Client for the remote generation service
///
/// `submit` has no side effects beyond the remote call and returns the
/// job id the service assigned; `status` is a read-only query.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Submit a generation job, returning its remote id
    async fn submit(&self, request: &JobRequest) -> Result<String, SubmitError>;

    /// Query the current status of a job
    async fn status(&self, job_id: &str) -> Result<JobStatus, QueryError>;
}

/// HTTP client for the generation service
pub struct HttpGenerationClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpGenerationClient {
    /// Create a client against `endpoint` (trailing slash expected)
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

#[async_trait]
impl GenerationApi for HttpGenerationClient {
    async fn submit(&self, request: &JobRequest) -> Result<String, SubmitError> {
        let body = SubmitBody::from_request(&self.model, request);

        let response = self
            .client
            .post(self.url("createTask"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        let http_status = response.status();
        if http_status == reqwest::StatusCode::UNAUTHORIZED
            || http_status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SubmitError::Auth(format!("HTTP {}", http_status)));
        }
        if http_status.is_client_error() {
            return Err(SubmitError::Validation(format!("HTTP {}", http_status)));
        }
        if !http_status.is_success() {
            return Err(SubmitError::Network(format!("HTTP {}", http_status)));
        }

        let envelope: ApiEnvelope<SubmitData> = response
            .json()
            .await
            .map_err(|e| SubmitError::Protocol(e.to_string()))?;
        if envelope.code != 200 {
            return Err(SubmitError::Validation(format!(
                "service code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        let data = envelope
            .data
            .ok_or_else(|| SubmitError::Protocol("submit response missing data".to_string()))?;

        debug!("Submitted job {}", data.task_id);
        Ok(data.task_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, QueryError> {
        let response = self
            .client
            .get(self.url("recordInfo"))
            .query(&[("taskId", job_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let http_status = response.status();
        if http_status == reqwest::StatusCode::UNAUTHORIZED
            || http_status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(QueryError::Auth(format!("HTTP {}", http_status)));
        }
        if !http_status.is_success() {
            return Err(QueryError::Network(format!("HTTP {}", http_status)));
        }

        let envelope: ApiEnvelope<StatusData> = response
            .json()
            .await
            .map_err(|e| QueryError::Protocol(e.to_string()))?;
        if envelope.code != 200 {
            return Err(QueryError::Protocol(format!(
                "service code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        let data = envelope
            .data
            .ok_or_else(|| QueryError::Protocol("status response missing data".to_string()))?;

        Ok(data.into_status())
    }
}
