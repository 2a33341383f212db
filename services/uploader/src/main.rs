//! kyc-upload: upload an identity document and print its KYC analysis.
//!
//! Bucket and endpoint come from `config/uploader.*`, `UPLOADER__*`
//! environment variables or the flags below.

use anyhow::Context;
use clap::Parser;
use kyc_uploader::{
    init_tracing, Config, DocumentUploader, KycApiClient, KycJob, KycWorkflow, Overrides,
    S3ObjectStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "kyc-upload", about = "Upload an identity document for KYC analysis")]
struct Cli {
    /// Path to the document image
    file: PathBuf,
    /// User the document belongs to
    #[arg(long)]
    user_id: String,
    /// Document id (object name); defaults to the file name
    #[arg(long)]
    document_id: Option<String>,
    /// S3 bucket to upload to
    #[arg(long, env = "S3_BUCKET")]
    bucket: Option<String>,
    /// AWS region
    #[arg(long)]
    region: Option<String>,
    /// Custom S3 endpoint URL
    #[arg(long)]
    endpoint_url: Option<String>,
    /// Analysis endpoint URL
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = Overrides {
        bucket: cli.bucket.clone(),
        region: cli.region.clone(),
        endpoint_url: cli.endpoint_url.clone(),
        api_url: cli.api_url.clone(),
    };

    let config = match Config::load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "KYC process failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let store = Arc::new(S3ObjectStore::new(&config.s3).await);
    let api_client = KycApiClient::new(config.api.url.clone(), config.api_timeout())
        .context("Failed to create KYC API client")?;

    let workflow = KycWorkflow::new(DocumentUploader::new(store), api_client);

    let job = KycJob {
        file_path: cli.file,
        bucket: config.s3.bucket.clone(),
        user_id: cli.user_id,
        document_id: cli.document_id,
    };

    let outcome = workflow.run(&job).await?;

    println!("{}", outcome.analysis.message);
    println!("{}", outcome.analysis.analysis);

    Ok(())
}
