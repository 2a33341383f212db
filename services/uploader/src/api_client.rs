//! Client for the KYC analysis endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Errors returned by the analysis endpoint client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Error calling KYC API: {0}")]
    Transport(String),

    #[error("KYC API returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Structured failure body, when the service sent one
        failure: Option<FailureResponse>,
    },

    #[error("Failed to decode KYC API response: {0}")]
    Decode(String),
}

/// Request body sent to the analysis endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub user_id: String,
    pub document_id: String,
}

/// Successful analysis response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub message: String,
    pub analysis: String,
}

/// Failure body returned by the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureResponse {
    pub message: String,
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// HTTP client for the analysis endpoint
pub struct KycApiClient {
    http_client: Client,
    url: String,
}

impl KycApiClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    /// Ask the service to analyze a previously uploaded document
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn request_analysis(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<AnalysisResponse, ApiError> {
        let result = self.send(user_id, document_id).await;

        if let Err(ref e) = result {
            error!(error = %e, "KYC analysis request failed");
        }

        result
    }

    async fn send(&self, user_id: &str, document_id: &str) -> Result<AnalysisResponse, ApiError> {
        let payload = AnalysisRequest {
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
        };

        let response = self
            .http_client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        debug!(status = status.as_u16(), size_bytes = body.len(), "KYC API responded");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                failure: serde_json::from_str(&body).ok(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
