use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extractors::ExtractError;
use crate::job::{DecodeError, JobField};

/// One message of an inbound batch, already lifted out of the transport envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    pub body: Option<String>,
    pub source: String,
    pub receive_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueueMessage {
    pub fn new(id: impl Into<String>, body: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: Some(body.into()),
            source: source.into(),
            receive_count: 0,
            sent_at: None,
        }
    }

    /// Length of the raw body in characters; zero when absent.
    pub fn body_length(&self) -> usize {
        self.body.as_deref().map_or(0, |body| body.chars().count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    EmptyBody,
    MalformedPayload,
    InvalidShape,
    MissingRequiredField,
    InvalidField,
    ExtractionFailed,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<JobField>,
    pub detail: String,
}

impl FailureReason {
    pub fn empty_body() -> Self {
        Self {
            kind: FailureKind::EmptyBody,
            field: None,
            detail: "message has no body".to_string(),
        }
    }
}

impl From<&DecodeError> for FailureReason {
    fn from(error: &DecodeError) -> Self {
        let kind = match error {
            DecodeError::MalformedPayload(_) => FailureKind::MalformedPayload,
            DecodeError::InvalidShape(_) => FailureKind::InvalidShape,
            DecodeError::MissingRequiredField { .. } => FailureKind::MissingRequiredField,
            DecodeError::InvalidField { .. } => FailureKind::InvalidField,
        };
        Self {
            kind,
            field: error.field(),
            detail: error.to_string(),
        }
    }
}

impl From<&ExtractError> for FailureReason {
    fn from(error: &ExtractError) -> Self {
        Self {
            kind: FailureKind::ExtractionFailed,
            field: None,
            detail: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub processed: bool,
    pub body_length: usize,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl RecordOutcome {
    pub fn succeeded(message: &QueueMessage) -> Self {
        Self {
            message_id: message.id.clone(),
            processed: true,
            body_length: message.body_length(),
            source: message.source.clone(),
            failure_reason: None,
        }
    }

    pub fn failed(message: &QueueMessage, reason: FailureReason) -> Self {
        Self {
            message_id: message.id.clone(),
            processed: false,
            body_length: message.body_length(),
            source: message.source.clone(),
            failure_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Partial,
    Failure,
}

impl BatchStatus {
    /// All processed (or nothing to process) is success, none processed is
    /// failure, anything in between is partial.
    pub fn from_outcomes(records: &[RecordOutcome]) -> Self {
        let processed = records.iter().filter(|r| r.processed).count();
        if processed == records.len() {
            BatchStatus::Success
        } else if processed == 0 {
            BatchStatus::Failure
        } else {
            BatchStatus::Partial
        }
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            BatchStatus::Success => "success",
            BatchStatus::Partial => "partial",
            BatchStatus::Failure => "failure",
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub processed_count: usize,
    pub records: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(records: Vec<RecordOutcome>) -> Self {
        Self {
            status: BatchStatus::from_outcomes(&records),
            processed_count: records.iter().filter(|r| r.processed).count(),
            records,
        }
    }

    /// Message ids of failed records, in batch order. Useful for partial
    /// acknowledgement of the batch.
    pub fn failed_message_ids(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.processed)
            .map(|r| r.message_id.as_str())
            .collect()
    }
}

/// Failures of a whole batch call. Per-record problems never end up here.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("invalid batch envelope: {0}")]
    InvalidEnvelope(String),

    #[error("internal batch error: {0}")]
    Internal(String),

    #[error("batch cancelled after {} of {total} records", .completed.len())]
    Cancelled {
        completed: Vec<RecordOutcome>,
        total: usize,
    },
}
