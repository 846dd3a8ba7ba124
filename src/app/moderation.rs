use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::AlertNotifier;
use crate::app::ports::{LabelDetector, ObjectStore, RecordStore};
use crate::config::policy::{FailurePolicy, ImageIdStrategy, PipelineStep, StepPolicies};
use crate::config::AppConfig;
use crate::domain::moderation::{
    destination_key, HandlerResponse, ImageCategory, LabelDenylist, ModerationRecord, UploadEvent,
    UNKNOWN_USER_EMAIL,
};

/// Object metadata entry carrying the uploader's address.
pub const USER_EMAIL_METADATA_KEY: &str = "user_email";

/// A step failed under the `propagate` policy.
#[derive(Debug, Error)]
#[error("{step} step failed")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Clone)]
pub struct ModerationSettings {
    pub safe_bucket: String,
    pub violent_bucket: String,
    pub denylist: LabelDenylist,
    pub image_id_strategy: ImageIdStrategy,
    pub compensate_on_record_failure: bool,
    pub policies: StepPolicies,
}

impl ModerationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            safe_bucket: config.safe_bucket.clone(),
            violent_bucket: config.violent_bucket.clone(),
            denylist: config.denylist.clone(),
            image_id_strategy: config.image_id_strategy,
            compensate_on_record_failure: config.compensate_on_record_failure,
            policies: config.step_policies,
        }
    }

    pub fn bucket_for(&self, category: ImageCategory) -> &str {
        match category {
            ImageCategory::Safe => &self.safe_bucket,
            ImageCategory::Violent => &self.violent_bucket,
        }
    }
}

/// Runs the moderation pipeline for one upload: metadata lookup, classification,
/// relocation, record write and the violent-image alert.
///
/// Holds no per-invocation state, so clones can serve concurrent events.
#[derive(Clone)]
pub struct ModerationService {
    storage: Arc<dyn ObjectStore>,
    detector: Arc<dyn LabelDetector>,
    records: Arc<dyn RecordStore>,
    notifier: AlertNotifier,
    settings: Arc<ModerationSettings>,
}

impl ModerationService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        detector: Arc<dyn LabelDetector>,
        records: Arc<dyn RecordStore>,
        notifier: AlertNotifier,
        settings: ModerationSettings,
    ) -> Self {
        Self {
            storage,
            detector,
            records,
            notifier,
            settings: Arc::new(settings),
        }
    }

    /// Handles each event in order. A propagated error stops the run; otherwise the
    /// first failure response is returned, or the success response when all passed.
    pub async fn handle_all(
        &self,
        events: &[UploadEvent],
    ) -> Result<HandlerResponse, PipelineError> {
        let mut first_failure = None;
        for event in events {
            let response = self.handle(event).await?;
            if !response.is_success() && first_failure.is_none() {
                first_failure = Some(response);
            }
        }
        Ok(first_failure.unwrap_or_else(HandlerResponse::processed))
    }

    pub async fn handle(&self, event: &UploadEvent) -> Result<HandlerResponse, PipelineError> {
        let image_id = image_id_for(self.settings.image_id_strategy, event);

        let user_email = match self.storage.object_metadata(&event.bucket, &event.key).await {
            Ok(metadata) => metadata
                .get(USER_EMAIL_METADATA_KEY)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USER_EMAIL.to_string()),
            Err(err) if self.degrades(PipelineStep::MetadataLookup) => {
                warn!(
                    error = ?err,
                    bucket = %event.bucket,
                    key = %event.key,
                    "failed to retrieve object metadata, using unknown user email"
                );
                UNKNOWN_USER_EMAIL.to_string()
            }
            Err(err) => return self.abort(PipelineStep::MetadataLookup, err, event),
        };

        let labels = match self
            .detector
            .detect_moderation_labels(&event.bucket, &event.key)
            .await
        {
            Ok(labels) => labels,
            Err(err) => return self.abort(PipelineStep::Classification, err, event),
        };

        let category = self.settings.denylist.classify(&labels);
        let final_bucket = self.settings.bucket_for(category).to_string();
        let s3_key = destination_key(category, image_id, event);

        if let Err(err) = self
            .storage
            .copy_object(&event.bucket, &event.key, &final_bucket, &s3_key)
            .await
        {
            return self.abort(PipelineStep::Copy, err, event);
        }

        let record = ModerationRecord {
            image_id,
            image_category: category,
            upload_time: OffsetDateTime::now_utc(),
            original_bucket: event.bucket.clone(),
            final_bucket: final_bucket.clone(),
            s3_key: s3_key.clone(),
            user_email: user_email.clone(),
        };

        let inserted = match self.write_record(&record).await {
            Ok(inserted) => inserted,
            Err(err) if self.degrades(PipelineStep::RecordWrite) => {
                warn!(error = ?err, image_id = %image_id, "failed to store moderation record");
                true
            }
            Err(err) => {
                if self.settings.compensate_on_record_failure {
                    self.remove_copy(&final_bucket, &s3_key).await;
                }
                return self.abort(PipelineStep::RecordWrite, err, event);
            }
        };
        if !inserted {
            info!(
                image_id = %image_id,
                bucket = %event.bucket,
                key = %event.key,
                "upload already recorded"
            );
        }

        if category == ImageCategory::Violent {
            if !inserted && self.alert_delivered(image_id).await {
                info!(image_id = %image_id, "alert already delivered, skipping notification");
            } else {
                match self.notifier.notify_flagged(&event.key, &user_email).await {
                    Ok(()) => self.mark_alert_delivered(image_id).await,
                    Err(err) if self.degrades(PipelineStep::Notify) => {
                        warn!(error = ?err, image_id = %image_id, "failed to send alert email");
                    }
                    Err(err) => return self.abort(PipelineStep::Notify, err, event),
                }
            }
        }

        info!(
            image_id = %image_id,
            category = %category,
            bucket = %event.bucket,
            key = %event.key,
            final_bucket = %final_bucket,
            final_key = %s3_key,
            "image processed"
        );
        Ok(HandlerResponse::processed())
    }

    async fn write_record(&self, record: &ModerationRecord) -> anyhow::Result<bool> {
        match self.settings.image_id_strategy {
            ImageIdStrategy::Random => {
                self.records.put_record(record).await?;
                Ok(true)
            }
            ImageIdStrategy::Deterministic => self.records.put_record_if_absent(record).await,
        }
    }

    // Lookup failures count as undelivered.
    async fn alert_delivered(&self, image_id: Uuid) -> bool {
        match self.records.alert_sent(image_id).await {
            Ok(sent) => sent,
            Err(err) => {
                warn!(error = ?err, image_id = %image_id, "failed to read alert marker");
                false
            }
        }
    }

    async fn mark_alert_delivered(&self, image_id: Uuid) {
        if self.settings.image_id_strategy != ImageIdStrategy::Deterministic {
            return;
        }
        if let Err(err) = self.records.mark_alert_sent(image_id).await {
            warn!(error = ?err, image_id = %image_id, "failed to store alert marker");
        }
    }

    async fn remove_copy(&self, bucket: &str, key: &str) {
        match self.storage.delete_object(bucket, key).await {
            Ok(()) => info!(bucket = %bucket, key = %key, "removed copy of unrecorded image"),
            Err(err) => warn!(
                error = ?err,
                bucket = %bucket,
                key = %key,
                "failed to remove copy of unrecorded image"
            ),
        }
    }

    fn degrades(&self, step: PipelineStep) -> bool {
        step.can_degrade() && self.settings.policies.for_step(step) == FailurePolicy::Degrade
    }

    fn abort(
        &self,
        step: PipelineStep,
        err: anyhow::Error,
        event: &UploadEvent,
    ) -> Result<HandlerResponse, PipelineError> {
        match self.settings.policies.for_step(step) {
            FailurePolicy::Propagate => Err(PipelineError { step, source: err }),
            FailurePolicy::Respond | FailurePolicy::Degrade => {
                error!(
                    error = ?err,
                    step = %step,
                    bucket = %event.bucket,
                    key = %event.key,
                    "moderation pipeline aborted"
                );
                Ok(HandlerResponse::failure(step.failure_message()))
            }
        }
    }
}

pub fn image_id_for(strategy: ImageIdStrategy, event: &UploadEvent) -> Uuid {
    match strategy {
        ImageIdStrategy::Random => Uuid::new_v4(),
        ImageIdStrategy::Deterministic => {
            let location = format!("s3://{}/{}", event.bucket, event.key);
            Uuid::new_v5(&Uuid::NAMESPACE_URL, location.as_bytes())
        }
    }
}
