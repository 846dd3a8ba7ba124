use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;

/// Pipeline steps whose failure handling is configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    MetadataLookup,
    Classification,
    Copy,
    RecordWrite,
    Notify,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 5] = [
        PipelineStep::MetadataLookup,
        PipelineStep::Classification,
        PipelineStep::Copy,
        PipelineStep::RecordWrite,
        PipelineStep::Notify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::MetadataLookup => "metadata_lookup",
            PipelineStep::Classification => "classification",
            PipelineStep::Copy => "copy",
            PipelineStep::RecordWrite => "record_write",
            PipelineStep::Notify => "notify",
        }
    }

    /// Environment variable holding the policy for this step
    pub fn env_key(&self) -> &'static str {
        match self {
            PipelineStep::MetadataLookup => "POLICY_METADATA_LOOKUP",
            PipelineStep::Classification => "POLICY_CLASSIFICATION",
            PipelineStep::Copy => "POLICY_COPY",
            PipelineStep::RecordWrite => "POLICY_RECORD_WRITE",
            PipelineStep::Notify => "POLICY_NOTIFY",
        }
    }

    /// Response body used when the step fails under `FailurePolicy::Respond`
    pub fn failure_message(&self) -> &'static str {
        match self {
            PipelineStep::MetadataLookup => "Error retrieving metadata for the image.",
            PipelineStep::Classification => "Error detecting moderation labels for the image.",
            PipelineStep::Copy => "Error copying the image to the target bucket.",
            PipelineStep::RecordWrite => "Error storing the image metadata record.",
            PipelineStep::Notify => "Error sending the inappropriate image alert.",
        }
    }

    /// Whether the pipeline can carry on without this step's result
    pub fn can_degrade(&self) -> bool {
        !matches!(self, PipelineStep::Classification | PipelineStep::Copy)
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the handler does when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and continue with the step's fallback
    Degrade,
    /// Stop and return a 500 response carrying the step's message
    Respond,
    /// Stop and surface the error to the hosting adapter
    Propagate,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(FailurePolicy::Degrade),
            "respond" => Ok(FailurePolicy::Respond),
            "propagate" => Ok(FailurePolicy::Propagate),
            other => Err(anyhow!("unknown failure policy: {}", other)),
        }
    }
}

/// Failure policy for every pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicies {
    metadata_lookup: FailurePolicy,
    classification: FailurePolicy,
    copy: FailurePolicy,
    record_write: FailurePolicy,
    notify: FailurePolicy,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            metadata_lookup: FailurePolicy::Degrade,
            classification: FailurePolicy::Propagate,
            copy: FailurePolicy::Respond,
            record_write: FailurePolicy::Propagate,
            notify: FailurePolicy::Propagate,
        }
    }
}

impl StepPolicies {
    pub fn for_step(&self, step: PipelineStep) -> FailurePolicy {
        match step {
            PipelineStep::MetadataLookup => self.metadata_lookup,
            PipelineStep::Classification => self.classification,
            PipelineStep::Copy => self.copy,
            PipelineStep::RecordWrite => self.record_write,
            PipelineStep::Notify => self.notify,
        }
    }

    /// Returns a copy with one step's policy replaced, rejecting `Degrade`
    /// for steps that have no fallback.
    pub fn with(mut self, step: PipelineStep, policy: FailurePolicy) -> Result<Self> {
        if policy == FailurePolicy::Degrade && !step.can_degrade() {
            return Err(anyhow!("{} step cannot use the degrade policy", step));
        }

        match step {
            PipelineStep::MetadataLookup => self.metadata_lookup = policy,
            PipelineStep::Classification => self.classification = policy,
            PipelineStep::Copy => self.copy = policy,
            PipelineStep::RecordWrite => self.record_write = policy,
            PipelineStep::Notify => self.notify = policy,
        }
        Ok(self)
    }

    /// Builds the table from `lookup`, falling back to the defaults for unset steps
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policies = Self::default();
        for step in PipelineStep::ALL {
            if let Some(value) = lookup(step.env_key()) {
                let policy = value
                    .parse::<FailurePolicy>()
                    .map_err(|err| anyhow!("invalid {}: {}", step.env_key(), err))?;
                policies = policies.with(step, policy)?;
            }
        }
        Ok(policies)
    }
}

/// How the image id of a record is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageIdStrategy {
    /// Fresh UUIDv4 per invocation; replays create duplicates
    #[default]
    Random,
    /// UUIDv5 of the source location, written with a conditional insert
    Deterministic,
}

impl FromStr for ImageIdStrategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(ImageIdStrategy::Random),
            "deterministic" => Ok(ImageIdStrategy::Deterministic),
            other => Err(anyhow!("unknown image id strategy: {}", other)),
        }
    }
}
