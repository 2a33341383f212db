use crate::api_client::{AnalysisResponse, ApiError, KycApiClient};
use crate::uploader::{DocumentUploader, UploadError, UploadReceipt};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Failed to upload document, KYC process aborted: {0}")]
    Upload(#[from] UploadError),

    #[error("Document uploaded but analysis failed: {0}")]
    Analysis(#[from] ApiError),
}

/// One document submission
#[derive(Debug, Clone)]
pub struct KycJob {
    pub file_path: PathBuf,
    pub bucket: String,
    pub user_id: String,
    /// Document id, also the object name; defaults to the file's base name
    pub document_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub upload: UploadReceipt,
    pub analysis: AnalysisResponse,
}

/// Upload a document, then request its analysis
pub struct KycWorkflow {
    uploader: DocumentUploader,
    api_client: KycApiClient,
}

impl KycWorkflow {
    pub fn new(uploader: DocumentUploader, api_client: KycApiClient) -> Self {
        Self {
            uploader,
            api_client,
        }
    }

    /// Analysis is requested only after a successful upload.
    #[instrument(skip(self, job), fields(user_id = %job.user_id))]
    pub async fn run(&self, job: &KycJob) -> Result<WorkflowOutcome, WorkflowError> {
        let upload = self
            .uploader
            .upload(
                &job.file_path,
                &job.bucket,
                &job.user_id,
                job.document_id.as_deref(),
            )
            .await?;

        info!(
            file = %job.file_path.display(),
            bucket = %upload.bucket,
            key = %upload.key,
            "Successfully uploaded document"
        );

        let analysis = self
            .api_client
            .request_analysis(&job.user_id, &upload.object_name)
            .await?;

        Ok(WorkflowOutcome { upload, analysis })
    }
}
