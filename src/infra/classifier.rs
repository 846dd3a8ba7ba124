use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_rekognition::types::{Image, S3Object};
use aws_sdk_rekognition::Client;
use tracing::debug;

use crate::app::ports::LabelDetector;
use crate::config::AppConfig;
use crate::domain::moderation::ModerationLabel;
use crate::infra::aws::load_sdk_config;

/// Rekognition moderation-label detection on objects already in S3.
#[derive(Clone)]
pub struct RekognitionClassifier {
    client: Client,
}

impl RekognitionClassifier {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let shared_config = load_sdk_config(&config.rekognition_region).await;

        let mut rekognition_builder = aws_sdk_rekognition::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned());
        if let Some(endpoint) = &config.rekognition_endpoint {
            rekognition_builder = rekognition_builder.endpoint_url(endpoint.clone());
        }
        if let Some(provider) = shared_config.credentials_provider() {
            rekognition_builder = rekognition_builder.credentials_provider(provider);
        }

        Ok(Self {
            client: Client::from_conf(rekognition_builder.build()),
        })
    }
}

#[async_trait]
impl LabelDetector for RekognitionClassifier {
    async fn detect_moderation_labels(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<ModerationLabel>> {
        let image = Image::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let response = self
            .client
            .detect_moderation_labels()
            .image(image)
            .send()
            .await
            .with_context(|| {
                format!("failed to detect moderation labels for s3://{}/{}", bucket, key)
            })?;

        let labels: Vec<ModerationLabel> = response
            .moderation_labels()
            .iter()
            .map(|label| {
                ModerationLabel::new(
                    label.name().unwrap_or_default(),
                    label.confidence().unwrap_or(0.0),
                )
            })
            .collect();

        debug!(bucket = %bucket, key = %key, count = labels.len(), "moderation labels detected");
        Ok(labels)
    }
}
