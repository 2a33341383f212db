//! KYC Uploader
//!
//! Client side of the KYC document check: stores an identity document in S3
//! under `{user_id}/{document_id}` and asks the analysis service to examine it.
//! The analysis is requested only once the upload has succeeded.

pub mod api_client;
pub mod config;
pub mod uploader;
pub mod workflow;

pub use api_client::{AnalysisResponse, ApiError, FailureResponse, KycApiClient};
pub use config::{Config, Overrides};
pub use uploader::{
    DocumentUploader, ObjectStore, ObjectStoreError, S3ObjectStore, UploadError, UploadReceipt,
};
pub use workflow::{KycJob, KycWorkflow, WorkflowError, WorkflowOutcome};

/// Initialize human-readable logging on stderr
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}
