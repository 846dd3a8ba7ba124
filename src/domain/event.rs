use serde::Deserialize;

use crate::domain::moderation::UploadEvent;

/// S3 bucket notification, as delivered over SQS or posted to the event endpoint.
///
/// Only the bucket name and object key of each record are consumed. Test
/// notifications (`s3:TestEvent`) carry no `Records` and parse to an empty list.
#[derive(Debug, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl S3Event {
    pub fn upload_events(&self) -> Vec<UploadEvent> {
        self.records
            .iter()
            .map(|record| UploadEvent::new(&record.s3.bucket.name, &record.s3.object.key))
            .collect()
    }
}
