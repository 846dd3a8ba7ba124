use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::app::ports::RecordStore;
use crate::config::AppConfig;
use crate::domain::moderation::ModerationRecord;
use crate::infra::aws::load_sdk_config;

/// Set once the alert for a violent record was delivered.
pub const ALERT_SENT_ATTRIBUTE: &str = "AlertSent";

/// DynamoDB table of moderation records keyed by `ImageID`.
#[derive(Clone)]
pub struct MetadataTable {
    client: Client,
    table: String,
}

impl MetadataTable {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let shared_config = load_sdk_config(&config.dynamodb_region).await;

        let mut dynamo_builder = aws_sdk_dynamodb::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned());
        if let Some(endpoint) = &config.dynamodb_endpoint {
            dynamo_builder = dynamo_builder.endpoint_url(endpoint.clone());
        }
        if let Some(provider) = shared_config.credentials_provider() {
            dynamo_builder = dynamo_builder.credentials_provider(provider);
        }

        Ok(Self {
            client: Client::from_conf(dynamo_builder.build()),
            table: config.metadata_table.clone(),
        })
    }

    fn key(image_id: Uuid) -> (String, AttributeValue) {
        ("ImageID".to_string(), AttributeValue::S(image_id.to_string()))
    }
}

pub fn record_item(record: &ModerationRecord) -> Result<HashMap<String, AttributeValue>> {
    let upload_time = record
        .upload_time
        .format(&Rfc3339)
        .context("failed to format upload time")?;

    let attributes = [
        ("ImageID", record.image_id.to_string()),
        ("ImageCategory", record.image_category.to_string()),
        ("UploadTime", upload_time),
        ("OriginalBucket", record.original_bucket.clone()),
        ("FinalBucket", record.final_bucket.clone()),
        ("S3Key", record.s3_key.clone()),
        ("UserEmail", record.user_email.clone()),
    ];

    Ok(attributes
        .into_iter()
        .map(|(name, value)| (name.to_string(), AttributeValue::S(value)))
        .collect())
}

#[async_trait]
impl RecordStore for MetadataTable {
    async fn put_record(&self, record: &ModerationRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_item(record)?))
            .send()
            .await
            .with_context(|| {
                format!("failed to store record {} in {}", record.image_id, self.table)
            })?;
        Ok(())
    }

    async fn put_record_if_absent(&self, record: &ModerationRecord) -> Result<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_item(record)?))
            .condition_expression("attribute_not_exists(ImageID)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Ok(false)
            }
            Err(err) => Err(err).with_context(|| {
                format!("failed to store record {} in {}", record.image_id, self.table)
            }),
        }
    }

    async fn alert_sent(&self, image_id: Uuid) -> Result<bool> {
        let (key_name, key_value) = Self::key(image_id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(key_name, key_value)
            .projection_expression(ALERT_SENT_ATTRIBUTE)
            .consistent_read(true)
            .send()
            .await
            .with_context(|| format!("failed to read record {} from {}", image_id, self.table))?;

        Ok(output
            .item()
            .and_then(|item| item.get(ALERT_SENT_ATTRIBUTE))
            .is_some_and(|value| value.as_bool() == Ok(&true)))
    }

    async fn mark_alert_sent(&self, image_id: Uuid) -> Result<()> {
        let (key_name, key_value) = Self::key(image_id);
        self.client
            .update_item()
            .table_name(&self.table)
            .key(key_name, key_value)
            .update_expression(format!("SET {} = :sent", ALERT_SENT_ATTRIBUTE))
            .condition_expression("attribute_exists(ImageID)")
            .expression_attribute_values(":sent", AttributeValue::Bool(true))
            .send()
            .await
            .with_context(|| format!("failed to mark alert for {} in {}", image_id, self.table))?;
        Ok(())
    }
}
