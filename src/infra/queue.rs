use anyhow::{anyhow, Context, Result};
use aws_sdk_sqs::Client;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::infra::aws::load_sdk_config;

/// SQS queue receiving S3 upload notifications.
#[derive(Clone)]
pub struct QueueClient {
    client: Client,
    queue_url: String,
}

#[derive(Debug)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: String,
}

impl QueueClient {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let queue_name = config
            .queue_name
            .as_deref()
            .ok_or_else(|| anyhow!("missing required env var: QUEUE_NAME"))?;

        let shared_config = load_sdk_config(&config.queue_region).await;

        let mut sqs_builder = aws_sdk_sqs::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned());
        if let Some(endpoint) = &config.queue_endpoint {
            sqs_builder = sqs_builder.endpoint_url(endpoint.clone());
        }
        if let Some(provider) = shared_config.credentials_provider() {
            sqs_builder = sqs_builder.credentials_provider(provider);
        }
        let sqs_config = sqs_builder.build();

        let client = Client::from_conf(sqs_config);
        let queue_url = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .with_context(|| format!("failed to resolve queue {}", queue_name))?
            .queue_url()
            .ok_or_else(|| anyhow!("missing queue url"))?
            .to_string();

        Ok(Self { client, queue_url })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub async fn receive_message(&self, wait_time_seconds: i32) -> Result<Option<ReceivedMessage>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_time_seconds)
            .send()
            .await?;

        let message = match response.messages().first() {
            Some(message) => message,
            None => return Ok(None),
        };

        let receipt_handle = match message.receipt_handle() {
            Some(handle) => handle.to_string(),
            None => {
                warn!("queue message missing receipt handle");
                return Ok(None);
            }
        };

        let body = match message.body() {
            Some(body) => body.to_string(),
            None => {
                warn!("queue message missing body, deleting");
                if let Err(err) = self.delete_message(&receipt_handle).await {
                    warn!(error = ?err, "failed to delete message without body");
                }
                return Ok(None);
            }
        };

        debug!(message_id = ?message.message_id(), "received upload notification");
        Ok(Some(ReceivedMessage { body, receipt_handle }))
    }

    pub async fn delete_message(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await?;

        Ok(())
    }
}
