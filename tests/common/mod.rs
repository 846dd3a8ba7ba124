#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

use vigil::app::moderation::{ModerationService, ModerationSettings};
use vigil::app::notifications::AlertNotifier;
use vigil::app::ports::{LabelDetector, Mailer, ObjectStore, RecordStore};
use vigil::config::policy::{ImageIdStrategy, StepPolicies};
use vigil::domain::moderation::{LabelDenylist, ModerationLabel, ModerationRecord};
use vigil::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SOURCE_BUCKET: &str = "uploads";
pub const SAFE_BUCKET: &str = "test-safepics";
pub const VIOLENT_BUCKET: &str = "test-violentpics";
pub const ALERT_SENDER: &str = "alerts@example.com";
pub const ALERT_RECIPIENT: &str = "reviewers@example.com";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCall {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
}

#[derive(Default)]
pub struct FakeStorage {
    metadata: Mutex<HashMap<(String, String), HashMap<String, String>>>,
    copies: Mutex<Vec<CopyCall>>,
    deletes: Mutex<Vec<(String, String)>>,
    fail_metadata: AtomicBool,
    fail_copy: AtomicBool,
}

impl FakeStorage {
    /// Registers an object; objects never registered behave as not found on head.
    pub fn put_object(&self, bucket: &str, key: &str, metadata: &[(&str, &str)]) {
        let metadata = metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.metadata
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), metadata);
    }

    pub fn fail_metadata(&self) {
        self.fail_metadata.store(true, Ordering::SeqCst);
    }

    pub fn fail_copy(&self) {
        self.fail_copy.store(true, Ordering::SeqCst);
    }

    pub fn copies(&self) -> Vec<CopyCall> {
        self.copies.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStorage {
    async fn object_metadata(&self, bucket: &str, key: &str) -> Result<HashMap<String, String>> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(anyhow!("access denied"));
        }
        self.metadata
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("NotFound: s3://{}/{}", bucket, key))
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(anyhow!("copy rejected"));
        }
        self.copies.lock().unwrap().push(CopyCall {
            source_bucket: source_bucket.to_string(),
            source_key: source_key.to_string(),
            destination_bucket: destination_bucket.to_string(),
            destination_key: destination_key.to_string(),
        });
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDetector {
    labels: Mutex<Vec<ModerationLabel>>,
    calls: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeDetector {
    pub fn returns(&self, labels: &[(&str, f32)]) {
        *self.labels.lock().unwrap() = labels
            .iter()
            .map(|(name, confidence)| ModerationLabel::new(*name, *confidence))
            .collect();
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelDetector for FakeDetector {
    async fn detect_moderation_labels(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<ModerationLabel>> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("rekognition unavailable"));
        }
        Ok(self.labels.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeRecords {
    records: Mutex<Vec<ModerationRecord>>,
    alerted: Mutex<Vec<Uuid>>,
    fail: AtomicBool,
}

impl FakeRecords {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ModerationRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn alerted(&self) -> Vec<Uuid> {
        self.alerted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeRecords {
    async fn put_record(&self, record: &ModerationRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("provisioned throughput exceeded"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn put_record_if_absent(&self, record: &ModerationRecord) -> Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("provisioned throughput exceeded"));
        }
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|existing| existing.image_id == record.image_id) {
            return Ok(false);
        }
        records.push(record.clone());
        Ok(true)
    }

    async fn alert_sent(&self, image_id: Uuid) -> Result<bool> {
        Ok(self.alerted.lock().unwrap().contains(&image_id))
    }

    async fn mark_alert_sent(&self, image_id: Uuid) -> Result<()> {
        let known = self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|record| record.image_id == image_id);
        if !known {
            return Err(anyhow!("conditional check failed for {}", image_id));
        }
        self.alerted.lock().unwrap().push(image_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl FakeMailer {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("message rejected"));
        }
        self.sent.lock().unwrap().push(SentEmail {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness (one per test, fakes are stateful)
// ---------------------------------------------------------------------------

pub struct Harness {
    pub storage: Arc<FakeStorage>,
    pub detector: Arc<FakeDetector>,
    pub records: Arc<FakeRecords>,
    pub mailer: Arc<FakeMailer>,
    pub service: ModerationService,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub fn settings() -> ModerationSettings {
    ModerationSettings {
        safe_bucket: SAFE_BUCKET.to_string(),
        violent_bucket: VIOLENT_BUCKET.to_string(),
        denylist: LabelDenylist::default(),
        image_id_strategy: ImageIdStrategy::Random,
        compensate_on_record_failure: false,
        policies: StepPolicies::default(),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: ModerationSettings) -> Self {
        let storage = Arc::new(FakeStorage::default());
        let detector = Arc::new(FakeDetector::default());
        let records = Arc::new(FakeRecords::default());
        let mailer = Arc::new(FakeMailer::default());

        let notifier = AlertNotifier::new(
            mailer.clone(),
            ALERT_SENDER.to_string(),
            ALERT_RECIPIENT.to_string(),
        );
        let service = ModerationService::new(
            storage.clone(),
            detector.clone(),
            records.clone(),
            notifier,
            settings,
        );

        Self {
            storage,
            detector,
            records,
            mailer,
            service,
        }
    }

    pub fn router(&self) -> Router {
        vigil::http::router(AppState {
            moderation: self.service.clone(),
        })
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body)).await
    }
}

/// S3 notification JSON for the given `(bucket, key)` pairs.
pub fn s3_event(objects: &[(&str, &str)]) -> Value {
    let records: Vec<Value> = objects
        .iter()
        .map(|(bucket, key)| {
            json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "us-west-2",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": { "name": bucket, "arn": format!("arn:aws:s3:::{}", bucket) },
                    "object": { "key": key, "size": 2048 }
                }
            })
        })
        .collect();
    json!({ "Records": records })
}

/// Asserts `key` is `{category}/{uuid}_{file_name}` and returns the uuid part.
pub fn assert_destination_key(key: &str, category: &str, file_name: &str) -> Uuid {
    let rest = key
        .strip_prefix(&format!("{}/", category))
        .unwrap_or_else(|| panic!("{} does not start with {}/", key, category));
    let (id, name) = rest
        .split_once('_')
        .unwrap_or_else(|| panic!("{} has no id separator", key));
    assert_eq!(name, file_name);
    Uuid::parse_str(id).unwrap_or_else(|_| panic!("{} is not a uuid", id))
}
