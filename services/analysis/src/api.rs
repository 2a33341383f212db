use crate::analysis_store::AnalysisRecord;
use crate::config::ApiConfig;
use crate::handler::{AnalysisError, ErrorResponse, KycAnalyzer};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub analyzer: KycAnalyzer,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.to_response())).into_response()
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/kyc/analyze", post(analyze_document))
        // Document ids may contain '/', as object keys do
        .route("/kyc/analyses/:user_id/*document_id", get(get_analysis))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name
    }))
}

/// Run the KYC pipeline for one stored document.
///
/// The body is taken raw so that malformed JSON is reported through the same
/// failure response as every other error.
async fn analyze_document(State(state): State<AppState>, body: Bytes) -> Response {
    match state.analyzer.handle(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Fetch a persisted analysis record
#[instrument(skip(state))]
async fn get_analysis(
    State(state): State<AppState>,
    Path((user_id, document_id)): Path<(String, String)>,
) -> Result<Json<AnalysisRecord>, (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .analyzer
        .lookup(&user_id, &document_id)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read analysis record");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(e.to_response()))
        })?;

    record.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                message: "KYC analysis not found".to_string(),
                error: format!("No analysis recorded for {}/{}", user_id, document_id),
                code: "NOT_FOUND".to_string(),
            }),
        )
    })
}

/// Serve the analysis API until `shutdown` resolves.
///
/// Returns an error when the listener cannot be bound or the server stops
/// on its own.
pub async fn start_api_server<F>(
    state: AppState,
    config: &ApiConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting KYC analysis API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
