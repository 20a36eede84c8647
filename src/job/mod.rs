use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod decoder;

pub use decoder::{decode, DecodeError, JobDecoder};

pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3";

/// A validated audio-extraction request decoded from a message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub file_url: String,
    pub output_format: String,
    pub quality: Quality,
    pub callback_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Default for Quality {
    fn default() -> Self {
        Self::Medium
    }
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Medium, Quality::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    /// Exact, case-sensitive match against the allowed values.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.as_str() == value)
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of the job payload, named the way they appear in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobField {
    JobId,
    FileUrl,
    OutputFormat,
    Quality,
    CallbackUrl,
    Timestamp,
}

impl JobField {
    /// Key of the field inside the JSON body.
    pub fn wire_key(&self) -> &'static str {
        match self {
            JobField::JobId => "job_id",
            JobField::FileUrl => "file_url",
            JobField::OutputFormat => "output_format",
            JobField::Quality => "quality",
            JobField::CallbackUrl => "callback_url",
            JobField::Timestamp => "timestamp",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobField::JobId => "jobId",
            JobField::FileUrl => "fileUrl",
            JobField::OutputFormat => "outputFormat",
            JobField::Quality => "quality",
            JobField::CallbackUrl => "callbackUrl",
            JobField::Timestamp => "timestamp",
        }
    }
}

impl Display for JobField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
