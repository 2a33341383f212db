use crate::config::DynamoDbConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Builder as DynamoDbConfigBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors that can occur when persisting analysis records
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write analysis record: {0}")]
    Write(String),

    #[error("Failed to read analysis record: {0}")]
    Read(String),

    #[error("Stored analysis record is invalid: {0}")]
    InvalidItem(String),
}

/// Result of one document analysis, keyed by (user_id, document_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub user_id: String,
    pub document_id: String,
    /// Model output, stored verbatim
    pub analysis: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(user_id: &str, document_id: &str, analysis: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
            analysis,
            analyzed_at: Utc::now(),
        }
    }

    fn to_item(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("user_id".to_string(), AttributeValue::S(self.user_id.clone())),
            (
                "document_id".to_string(),
                AttributeValue::S(self.document_id.clone()),
            ),
            ("analysis".to_string(), AttributeValue::S(self.analysis.clone())),
            (
                "analyzed_at".to_string(),
                AttributeValue::S(self.analyzed_at.to_rfc3339()),
            ),
        ])
    }

    fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Self, PersistenceError> {
        let string_attr = |name: &str| -> Result<String, PersistenceError> {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .ok_or_else(|| {
                    PersistenceError::InvalidItem(format!("missing string attribute '{}'", name))
                })
        };

        // Items written before analyzed_at existed carry no timestamp
        let analyzed_at = match item.get("analyzed_at").and_then(|v| v.as_s().ok()) {
            Some(ts) => DateTime::parse_from_rfc3339(ts)
                .map_err(|e| PersistenceError::InvalidItem(format!("analyzed_at: {}", e)))?
                .with_timezone(&Utc),
            None => DateTime::<Utc>::default(),
        };

        Ok(Self {
            user_id: string_attr("user_id")?,
            document_id: string_attr("document_id")?,
            analysis: string_attr("analysis")?,
            analyzed_at,
        })
    }
}

/// Key-value persistence for analysis records
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Write a record, replacing any previous record for the same key
    async fn put(&self, record: &AnalysisRecord) -> Result<(), PersistenceError>;

    /// Read the record for a (user_id, document_id) pair
    async fn get(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisRecord>, PersistenceError>;
}

/// Analysis store backed by a DynamoDB table
pub struct DynamoDbAnalysisStore {
    client: DynamoDbClient,
    table: String,
}

impl DynamoDbAnalysisStore {
    pub async fn new(config: &DynamoDbConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = DynamoDbConfigBuilder::from(&aws_config);

        // DynamoDB Local / LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        info!(
            table = %config.table,
            region = %config.region,
            "DynamoDB analysis store initialized"
        );

        Self {
            client: DynamoDbClient::from_conf(builder.build()),
            table: config.table.clone(),
        }
    }
}

#[async_trait]
impl AnalysisStore for DynamoDbAnalysisStore {
    #[instrument(skip(self, record), fields(table = %self.table, user_id = %record.user_id, document_id = %record.document_id))]
    async fn put(&self, record: &AnalysisRecord) -> Result<(), PersistenceError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record.to_item()))
            .send()
            .await
            .map_err(|e| {
                PersistenceError::Write(
                    aws_sdk_dynamodb::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        debug!("Analysis record written");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn get(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisRecord>, PersistenceError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .key("document_id", AttributeValue::S(document_id.to_string()))
            .send()
            .await
            .map_err(|e| {
                PersistenceError::Read(aws_sdk_dynamodb::error::DisplayErrorContext(&e).to_string())
            })?;

        output.item().map(AnalysisRecord::from_item).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> AnalysisRecord {
        AnalysisRecord {
            user_id: "user1235".to_string(),
            document_id: "id1235".to_string(),
            analysis: r#"{"document_type": "passport", "risk_score": 2}"#.to_string(),
            analyzed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_item_attributes() {
        let item = sample_record().to_item();
        assert_eq!(item.len(), 4);
        assert_eq!(item["user_id"].as_s().unwrap(), "user1235");
        assert_eq!(item["document_id"].as_s().unwrap(), "id1235");
        assert_eq!(item["analyzed_at"].as_s().unwrap(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_item_conversion_preserves_analysis_text() {
        let record = sample_record();
        let restored = AnalysisRecord::from_item(&record.to_item()).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_from_item_without_timestamp() {
        let mut item = sample_record().to_item();
        item.remove("analyzed_at");
        let restored = AnalysisRecord::from_item(&item).unwrap();
        assert_eq!(restored.analyzed_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_from_item_missing_analysis() {
        let mut item = sample_record().to_item();
        item.remove("analysis");
        let err = AnalysisRecord::from_item(&item).unwrap_err();
        assert!(err.to_string().contains("analysis"));
    }

    #[test]
    fn test_from_item_wrong_type() {
        let mut item = sample_record().to_item();
        item.insert("user_id".to_string(), AttributeValue::N("7".to_string()));
        assert!(AnalysisRecord::from_item(&item).is_err());
    }
}
