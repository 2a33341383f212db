//! The KYC analysis pipeline: fetch, encode, infer, persist, respond.

use crate::analysis_store::{AnalysisRecord, AnalysisStore, PersistenceError};
use crate::config::InferenceConfig;
use crate::document_store::{document_key, DocumentStore, StorageError};
use crate::inference::{detect_media_type, InferenceClient, InferenceError, InferenceRequest};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Instruction sent alongside every document image
pub const KYC_INSTRUCTION: &str = "Please analyze this image for KYC purposes. \
Extract any relevant information such as name, date of birth, address, and document type. \
Also, check for any signs of tampering or fraudulent alterations. \
Provide a risk score between 1 and 10 with 10 being high risk. \
The output is to be provided in json format.";

pub const SUCCESS_MESSAGE: &str = "KYC analysis completed successfully";

/// Body of an analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub user_id: String,
    pub document_id: String,
}

/// Body of a successful analysis response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub message: String,
    pub analysis: String,
}

/// Body of a failed analysis response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
    pub code: String,
}

/// Failure of one analysis invocation
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),

    #[error("Document {0} not found in storage")]
    DocumentNotFound(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<StorageError> for AnalysisError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AnalysisError::DocumentNotFound(key),
            other => AnalysisError::Storage(other),
        }
    }
}

impl AnalysisError {
    /// Stable code identifying the failing step
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "INVALID_REQUEST",
            AnalysisError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            AnalysisError::Storage(_) => "STORAGE_ERROR",
            AnalysisError::Inference(_) => "INFERENCE_ERROR",
            AnalysisError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Human-readable summary of the failing step
    pub fn message(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "Invalid KYC analysis request",
            AnalysisError::DocumentNotFound(_) => "KYC document not found",
            AnalysisError::Storage(_) => "Error retrieving KYC document",
            AnalysisError::Inference(_) => "Error analyzing KYC document",
            AnalysisError::Persistence(_) => "Error storing KYC analysis",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            message: self.message().to_string(),
            error: self.to_string(),
            code: self.code().to_string(),
        }
    }
}

impl AnalysisRequest {
    /// Parse and validate a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, AnalysisError> {
        let request: AnalysisRequest = serde_json::from_slice(body)
            .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;

        if request.user_id.is_empty() {
            return Err(AnalysisError::InvalidRequest("user_id is empty".into()));
        }
        if request.document_id.is_empty() {
            return Err(AnalysisError::InvalidRequest("document_id is empty".into()));
        }

        Ok(request)
    }
}

/// Runs the analysis pipeline against injected storage, model and table clients
#[derive(Clone)]
pub struct KycAnalyzer {
    documents: Arc<dyn DocumentStore>,
    model: Arc<dyn InferenceClient>,
    records: Arc<dyn AnalysisStore>,
    anthropic_version: String,
    max_tokens: u32,
}

impl KycAnalyzer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        model: Arc<dyn InferenceClient>,
        records: Arc<dyn AnalysisStore>,
        config: &InferenceConfig,
    ) -> Self {
        Self {
            documents,
            model,
            records,
            anthropic_version: config.anthropic_version.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Handle a raw request body. Every failure, including a malformed body,
    /// comes back as an `AnalysisError`.
    pub async fn handle(&self, body: &[u8]) -> Result<AnalysisResponse, AnalysisError> {
        let result = match AnalysisRequest::parse(body) {
            Ok(request) => self.analyze(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                metrics::counter!("kyc.analysis.completed").increment(1);
                Ok(AnalysisResponse {
                    message: SUCCESS_MESSAGE.to_string(),
                    analysis: record.analysis,
                })
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "KYC analysis failed");
                metrics::counter!("kyc.analysis.failed", "code" => e.code()).increment(1);
                Err(e)
            }
        }
    }

    /// Analyze a stored document and persist the result
    #[instrument(skip(self, request), fields(user_id = %request.user_id, document_id = %request.document_id))]
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisRecord, AnalysisError> {
        let key = document_key(&request.user_id, &request.document_id);
        let image = self.documents.get(&key).await?;

        let inference_request = self.build_request(&image);
        let analysis = self.model.invoke(&inference_request).await?;

        let record = AnalysisRecord::new(&request.user_id, &request.document_id, analysis);
        self.records.put(&record).await?;

        info!(
            key = %key,
            size_bytes = image.len(),
            analysis_len = record.analysis.len(),
            "KYC analysis completed"
        );

        Ok(record)
    }

    /// Read back a previously persisted analysis
    pub async fn lookup(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisRecord>, AnalysisError> {
        Ok(self.records.get(user_id, document_id).await?)
    }

    fn build_request(&self, image: &[u8]) -> InferenceRequest {
        InferenceRequest::image_analysis(
            &self.anthropic_version,
            self.max_tokens,
            KYC_INSTRUCTION,
            detect_media_type(image),
            STANDARD.encode(image),
        )
    }
}
