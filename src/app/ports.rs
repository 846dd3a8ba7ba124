use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::moderation::{ModerationLabel, ModerationRecord};

/// Blob storage holding the uploaded and relocated images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// User-supplied metadata of an object (without the `x-amz-meta-` prefix).
    async fn object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> anyhow::Result<HashMap<String, String>>;
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> anyhow::Result<()>;
    async fn delete_object(&self, bucket: &str, key: &str) -> anyhow::Result<()>;
}

/// Content-moderation labeling service.
#[async_trait]
pub trait LabelDetector: Send + Sync {
    async fn detect_moderation_labels(
        &self,
        bucket: &str,
        key: &str,
    ) -> anyhow::Result<Vec<ModerationLabel>>;
}

/// Metadata table receiving one record per processed upload.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_record(&self, record: &ModerationRecord) -> anyhow::Result<()>;
    /// Inserts unless a record with the same image id exists. Returns `false` on conflict.
    async fn put_record_if_absent(&self, record: &ModerationRecord) -> anyhow::Result<bool>;
    /// Whether the alert for an existing record has been delivered.
    async fn alert_sent(&self, image_id: Uuid) -> anyhow::Result<bool>;
    async fn mark_alert_sent(&self, image_id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
