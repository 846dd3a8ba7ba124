use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::Mailer;

pub const ALERT_SUBJECT: &str = "Inappropriate Image Alert";

/// Sends flagged-image alerts to the fixed reviewer address.
#[derive(Clone)]
pub struct AlertNotifier {
    mailer: Arc<dyn Mailer>,
    sender: String,
    recipient: String,
}

impl AlertNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, sender: String, recipient: String) -> Self {
        Self {
            mailer,
            sender,
            recipient,
        }
    }

    /// `user_email` is logged for auditing only, it never receives the alert.
    pub async fn notify_flagged(&self, source_key: &str, user_email: &str) -> Result<()> {
        let body = alert_body(source_key);
        self.mailer
            .send(&self.sender, &self.recipient, ALERT_SUBJECT, &body)
            .await?;

        info!(
            key = %source_key,
            user_email = %user_email,
            recipient = %self.recipient,
            "inappropriate image alert sent"
        );
        Ok(())
    }
}

pub fn alert_body(source_key: &str) -> String {
    format!(
        "An image you uploaded with key {} has been flagged as inappropriate and moved to the 'violent' bucket. Please review the image content.",
        source_key
    )
}
