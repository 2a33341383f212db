//! Multimodal inference requests in the Anthropic messages format, sent
//! through Bedrock's InvokeModel.

use crate::config::InferenceConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors that can occur when invoking the inference model
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to serialize inference request: {0}")]
    Serialization(String),

    #[error("Model invocation failed: {0}")]
    Invocation(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Request body for an Anthropic model hosted on Bedrock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// Response body returned by the model
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl InferenceRequest {
    /// Build a single-turn request pairing an instruction with a base64 image
    pub fn image_analysis(
        anthropic_version: &str,
        max_tokens: u32,
        instruction: &str,
        media_type: &str,
        image_base64: String,
    ) -> Self {
        Self {
            anthropic_version: anthropic_version.to_string(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Text {
                        text: instruction.to_string(),
                    },
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: media_type.to_string(),
                            data: image_base64,
                        },
                    },
                ],
            }],
        }
    }

    /// The image attached to the request, if any
    pub fn image(&self) -> Option<&ImageSource> {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|block| match block {
                ContentBlock::Image { source } => Some(source),
                ContentBlock::Text { .. } => None,
            })
    }
}

impl InferenceResponse {
    /// Text of the first content block
    pub fn into_first_text(self) -> Result<String, InferenceError> {
        let first = self
            .content
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::MalformedResponse("response has no content".into()))?;

        first.text.ok_or_else(|| {
            InferenceError::MalformedResponse(format!(
                "first content block is '{}' without text",
                first.block_type
            ))
        })
    }
}

/// Parse a raw model response body and extract the analysis text
pub fn parse_response(body: &[u8]) -> Result<String, InferenceError> {
    let response: InferenceResponse = serde_json::from_slice(body)
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
    response.into_first_text()
}

/// Detect media type from image data using magic numbers
pub fn detect_media_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }

    if data.starts_with(b"GIF8") {
        return "image/gif";
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp";
    }

    // JPEG (FF D8 FF) and anything unrecognised
    "image/jpeg"
}

/// A hosted model that turns an inference request into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Invoke the model and return the text of its first content block
    async fn invoke(&self, request: &InferenceRequest) -> Result<String, InferenceError>;
}

/// Inference client calling Bedrock's InvokeModel
pub struct BedrockInferenceClient {
    client: BedrockClient,
    model_id: String,
}

impl BedrockInferenceClient {
    pub async fn new(config: &InferenceConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        info!(
            model_id = %config.model_id,
            region = %config.region,
            "Bedrock inference client initialized"
        );

        Self {
            client: BedrockClient::new(&aws_config),
            model_id: config.model_id.clone(),
        }
    }
}

#[async_trait]
impl InferenceClient for BedrockInferenceClient {
    #[instrument(skip(self, request), fields(model_id = %self.model_id))]
    async fn invoke(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| InferenceError::Serialization(e.to_string()))?;

        debug!(size_bytes = body.len(), "Invoking model");
        let started = Instant::now();

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                InferenceError::Invocation(
                    aws_sdk_bedrockruntime::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        metrics::histogram!("kyc.inference.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        parse_response(output.body().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = InferenceRequest::image_analysis(
            "bedrock-2023-05-31",
            1000,
            "describe",
            "image/jpeg",
            "AAEC".to_string(),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 1000,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "describe"},
                        {"type": "image", "source": {
                            "type": "base64",
                            "media_type": "image/jpeg",
                            "data": "AAEC"
                        }}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_image_accessor() {
        let request = InferenceRequest::image_analysis(
            "v",
            10,
            "describe",
            "image/png",
            "data".to_string(),
        );
        let image = request.image().unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data, "data");
    }

    #[test]
    fn test_parse_response_first_block() {
        let body = br#"{"id":"msg_1","content":[{"type":"text","text":"{\"risk_score\": 3}"},{"type":"text","text":"ignored"}]}"#;
        assert_eq!(parse_response(body).unwrap(), "{\"risk_score\": 3}");
    }

    #[test]
    fn test_parse_response_empty_content() {
        let err = parse_response(br#"{"content":[]}"#).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_response_block_without_text() {
        let err = parse_response(br#"{"content":[{"type":"tool_use","id":"x"}]}"#).unwrap_err();
        assert!(err.to_string().contains("tool_use"));
    }

    #[test]
    fn test_parse_response_not_json() {
        assert!(parse_response(b"<html>").is_err());
    }

    #[test]
    fn test_detect_media_type() {
        assert_eq!(detect_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(detect_media_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D]), "image/png");
        assert_eq!(detect_media_type(b"GIF89a"), "image/gif");
        assert_eq!(detect_media_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(detect_media_type(&[0x00]), "image/jpeg");
    }
}
