use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Labels that flag an image as violent when no override is configured.
pub const DEFAULT_DENYLIST: [&str; 11] = [
    "violence",
    "explicit",
    "gore",
    "blood",
    "partial nudity",
    "nudity",
    "drug",
    "death",
    "drug abuse",
    "smoking",
    "drinking",
];

pub const UNKNOWN_USER_EMAIL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Safe,
    Violent,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Safe => "safe",
            ImageCategory::Violent => "violent",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload notification: the object that was just written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Last path component of the object key, or the whole key when it has no `/`.
    pub fn file_name(&self) -> &str {
        match self.key.rfind('/') {
            Some(idx) => &self.key[idx + 1..],
            None => &self.key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationLabel {
    pub name: String,
    pub confidence: f32,
}

impl ModerationLabel {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Lowercase label names that make an image violent.
///
/// Matching is on the name alone; the detection confidence is not consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDenylist {
    labels: HashSet<String>,
}

impl LabelDenylist {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|label| label.as_ref().trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();
        Self { labels }
    }

    pub fn contains(&self, label_name: &str) -> bool {
        self.labels.contains(&label_name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn classify(&self, labels: &[ModerationLabel]) -> ImageCategory {
        if labels.iter().any(|label| self.contains(&label.name)) {
            ImageCategory::Violent
        } else {
            ImageCategory::Safe
        }
    }
}

impl Default for LabelDenylist {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST)
    }
}

/// Key of the relocated object: `{category}/{image_id}_{file_name}`.
pub fn destination_key(category: ImageCategory, image_id: Uuid, event: &UploadEvent) -> String {
    format!("{}/{}_{}", category, image_id, event.file_name())
}

/// Row written to the metadata table, one per processed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModerationRecord {
    #[serde(rename = "ImageID")]
    pub image_id: Uuid,
    pub image_category: ImageCategory,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_time: OffsetDateTime,
    pub original_bucket: String,
    pub final_bucket: String,
    #[serde(rename = "S3Key")]
    pub s3_key: String,
    pub user_email: String,
}

/// Terminal status of one invocation, in the `{statusCode, body}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub const PROCESSED: &'static str = "Image processed successfully.";

    pub fn processed() -> Self {
        Self {
            status_code: 200,
            body: Self::PROCESSED.to_string(),
        }
    }

    pub fn failure(body: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
