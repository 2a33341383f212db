//! KYC Analysis Service
//!
//! Server side of the KYC document check. For each request naming a
//! `(user_id, document_id)` pair the service reads the uploaded identity
//! document from S3, asks a hosted multimodal model (Bedrock, Anthropic
//! messages format) to extract the holder's details and score the document's
//! risk, stores the model's answer in DynamoDB and returns it.
//!
//! ## Architecture
//!
//! ```text
//!  POST /kyc/analyze
//!        │
//!        ▼
//! ┌──────────────┐  get {user}/{doc}  ┌──────────────┐
//! │ KycAnalyzer  │───────────────────▶│ S3 bucket    │
//! │              │                    └──────────────┘
//! │              │  InvokeModel       ┌──────────────┐
//! │              │───────────────────▶│ Bedrock      │
//! │              │                    └──────────────┘
//! │              │  PutItem           ┌──────────────┐
//! │              │───────────────────▶│ DynamoDB     │
//! └──────────────┘                    └──────────────┘
//! ```
//!
//! Storage, model and table are reached through the [`DocumentStore`],
//! [`InferenceClient`] and [`AnalysisStore`] traits so the pipeline can run
//! against in-memory doubles.

pub mod analysis_store;
pub mod api;
pub mod config;
pub mod document_store;
pub mod handler;
pub mod inference;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis_store::{AnalysisRecord, AnalysisStore, DynamoDbAnalysisStore, PersistenceError};
pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use document_store::{DocumentStore, S3DocumentStore, StorageError};
pub use handler::{AnalysisError, AnalysisRequest, AnalysisResponse, ErrorResponse, KycAnalyzer};
pub use inference::{BedrockInferenceClient, InferenceClient, InferenceError, InferenceRequest};
