use serde::Deserialize;
use std::time::Duration;

/// Uploader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// S3 configuration
    pub s3: S3Config,
    /// Analysis API configuration
    pub api: ApiConfig,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket receiving uploaded documents
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// Analysis endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Full URL of the analysis endpoint
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Values given on the command line, applied over files and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub api_url: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Load configuration from config files, environment and command-line overrides
    pub fn load(overrides: &Overrides) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/uploader").required(false))
            // UPLOADER__API__URL -> api.url
            .add_source(
                config::Environment::with_prefix("UPLOADER")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::apply_overrides(config, overrides)?
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    fn apply_overrides(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        overrides: &Overrides,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        builder
            .set_override_option("s3.bucket", overrides.bucket.clone())?
            .set_override_option("s3.region", overrides.region.clone())?
            .set_override_option("s3.endpoint_url", overrides.endpoint_url.clone())?
            .set_override_option("api.url", overrides.api_url.clone())
    }

    /// Get the API request timeout as Duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}
