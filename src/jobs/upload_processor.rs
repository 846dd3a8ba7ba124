use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::app::moderation::ModerationService;
use crate::domain::event::S3Event;
use crate::infra::queue::QueueClient;

const POLL_WAIT_SECONDS: i32 = 10;
const IDLE_SLEEP_MS: u64 = 200;
const ERROR_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Message is done with and can be deleted
    Completed,
    /// Leave the message so the queue redelivers it
    RetryLater,
}

pub async fn run(service: ModerationService, queue: QueueClient) -> Result<()> {
    info!(queue_url = %queue.queue_url(), "upload processor started");
    loop {
        match queue.receive_message(POLL_WAIT_SECONDS).await {
            Ok(Some(message)) => {
                let outcome = process_message(&service, &message.body).await;
                if outcome == ProcessingOutcome::Completed {
                    if let Err(err) = queue.delete_message(&message.receipt_handle).await {
                        warn!(error = ?err, "failed to delete queue message");
                    }
                }
            }
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(IDLE_SLEEP_MS)).await;
            }
            Err(err) => {
                warn!(error = ?err, "queue receive failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

/// Runs the pipeline for every upload in one notification body.
pub async fn process_message(service: &ModerationService, body: &str) -> ProcessingOutcome {
    let event: S3Event = match serde_json::from_str(body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = ?err, "failed to parse upload notification, dropping");
            return ProcessingOutcome::Completed;
        }
    };

    let uploads = event.upload_events();
    if uploads.is_empty() {
        debug!("notification without records, dropping");
        return ProcessingOutcome::Completed;
    }

    match service.handle_all(&uploads).await {
        Ok(response) if response.is_success() => ProcessingOutcome::Completed,
        Ok(response) => {
            warn!(
                status_code = response.status_code,
                body = %response.body,
                "upload processing failed"
            );
            ProcessingOutcome::Completed
        }
        Err(err) => {
            error!(
                error = ?err,
                step = %err.step,
                "upload processing failed, leaving message for redelivery"
            );
            ProcessingOutcome::RetryLater
        }
    }
}
