use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;

use crate::app::ports::ObjectStore;
use crate::config::AppConfig;
use crate::infra::aws::load_sdk_config;

// Unreserved characters plus the path separator stay readable in the copy source.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let shared_config = load_sdk_config(&config.s3_region).await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned());
        if let Some(endpoint) = &config.s3_endpoint {
            s3_builder = s3_builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }
}

/// `x-amz-copy-source` value: source bucket and percent-encoded key.
pub fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE))
}

#[async_trait]
impl ObjectStore for ObjectStorage {
    async fn object_metadata(&self, bucket: &str, key: &str) -> Result<HashMap<String, String>> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to read metadata of s3://{}/{}", bucket, key))?;

        Ok(head.metadata().cloned().unwrap_or_default())
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(destination_bucket)
            .key(destination_key)
            .send()
            .await
            .with_context(|| {
                format!(
                    "failed to copy s3://{}/{} to s3://{}/{}",
                    source_bucket, source_key, destination_bucket, destination_key
                )
            })?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::copy_source;

    #[test]
    fn copy_source_keeps_separators() {
        assert_eq!(copy_source("uploads", "user1/dog.png"), "uploads/user1/dog.png");
    }

    #[test]
    fn copy_source_encodes_special_characters() {
        assert_eq!(
            copy_source("uploads", "user 1/my+photo?.png"),
            "uploads/user%201/my%2Bphoto%3F.png"
        );
    }
}
