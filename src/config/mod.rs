pub mod policy;

use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config::policy::{ImageIdStrategy, StepPolicies};
use crate::domain::moderation::LabelDenylist;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub rekognition_region: String,
    pub rekognition_endpoint: Option<String>,
    pub dynamodb_region: String,
    pub dynamodb_endpoint: Option<String>,
    pub queue_region: String,
    pub queue_endpoint: Option<String>,
    pub queue_name: Option<String>,
    pub safe_bucket: String,
    pub violent_bucket: String,
    pub metadata_table: String,
    pub alert_recipient: String,
    pub alert_sender: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub denylist: LabelDenylist,
    pub image_id_strategy: ImageIdStrategy,
    pub compensate_on_record_failure: bool,
    pub step_policies: StepPolicies,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let s3_region = env_or("S3_REGION", "us-west-2");
        let dynamodb_region = env_or("DYNAMODB_REGION", &s3_region);
        let queue_region = env_or("QUEUE_REGION", &s3_region);

        let queue_name = env_opt("QUEUE_NAME");
        if app_mode == "worker" && queue_name.is_none() {
            return Err(anyhow!("missing required env var: QUEUE_NAME"));
        }

        let denylist = match env_opt("DENYLIST_LABELS") {
            Some(value) => LabelDenylist::new(value.split(',')),
            None => LabelDenylist::default(),
        };
        if denylist.is_empty() {
            return Err(anyhow!("invalid DENYLIST_LABELS: no labels given"));
        }

        Ok(Self {
            http_addr,
            app_mode,
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_region,
            rekognition_region: env_or("REKOGNITION_REGION", "us-west-2"),
            rekognition_endpoint: env_opt("REKOGNITION_ENDPOINT"),
            dynamodb_region,
            dynamodb_endpoint: env_opt("DYNAMODB_ENDPOINT"),
            queue_region,
            queue_endpoint: env_opt("QUEUE_ENDPOINT"),
            queue_name,
            safe_bucket: env_or("SAFE_BUCKET", "imagemoderation-safepics"),
            violent_bucket: env_or("VIOLENT_BUCKET", "imagemoderation-violentpics"),
            metadata_table: env_or("METADATA_TABLE", "ImageModerationMetadata"),
            alert_recipient: env_or_err("ALERT_RECIPIENT")?,
            alert_sender: env_or_err("ALERT_SENDER")?,
            smtp_host: env_or_err("SMTP_HOST")?,
            smtp_port: env_or_parse("SMTP_PORT", "587")?,
            smtp_username: env_opt("SMTP_USERNAME"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            smtp_starttls: env_or_parse("SMTP_STARTTLS", "true")?,
            denylist,
            image_id_strategy: env_or_parse("IMAGE_ID_STRATEGY", "random")?,
            compensate_on_record_failure: env_or_parse("COMPENSATE_ON_RECORD_FAILURE", "false")?,
            step_policies: StepPolicies::from_lookup(env_opt)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
