//! Inbound SQS batch envelope, as delivered by a Lambda-style event source.
//!
//! Only `messageId` is required per record; everything else is carried for
//! information and mapped onto [`QueueMessage`] on a best-effort basis.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchError, QueueMessage};

const DEFAULT_EVENT_SOURCE: &str = "aws:sqs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SqsEvent {
    pub records: Vec<SqsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsRecord {
    pub message_id: String,
    #[serde(default)]
    pub receipt_handle: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub attributes: SqsAttributes,
    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
    #[serde(default)]
    pub md5_of_body: Option<String>,
    #[serde(default = "default_event_source")]
    pub event_source: String,
    #[serde(default, rename = "eventSourceARN")]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SqsAttributes {
    pub approximate_receive_count: Option<String>,
    pub sent_timestamp: Option<String>,
    pub sender_id: Option<String>,
    pub approximate_first_receive_timestamp: Option<String>,
    // FIFO queues only
    pub sequence_number: Option<String>,
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttribute {
    pub string_value: Option<String>,
    #[serde(default)]
    pub string_list_values: Vec<String>,
    #[serde(default)]
    pub binary_list_values: Vec<String>,
    #[serde(default)]
    pub data_type: String,
}

fn default_event_source() -> String {
    DEFAULT_EVENT_SOURCE.to_string()
}

impl SqsEvent {
    /// Parses a raw request body. Any failure here concerns the batch as a
    /// whole, never a single record.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BatchError> {
        serde_json::from_slice(bytes).map_err(|e| BatchError::InvalidEnvelope(e.to_string()))
    }

    pub fn into_messages(self) -> Vec<QueueMessage> {
        self.records.into_iter().map(QueueMessage::from).collect()
    }
}

impl SqsRecord {
    /// The queue ARN when known, the generic event source otherwise.
    pub fn source(&self) -> &str {
        self.event_source_arn
            .as_deref()
            .filter(|arn| !arn.is_empty())
            .unwrap_or(&self.event_source)
    }
}

impl SqsAttributes {
    pub fn receive_count(&self) -> u32 {
        self.approximate_receive_count
            .as_deref()
            .and_then(|count| count.parse().ok())
            .unwrap_or(0)
    }

    /// `SentTimestamp` is epoch milliseconds.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_timestamp
            .as_deref()
            .and_then(|millis| millis.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

impl From<SqsRecord> for QueueMessage {
    fn from(record: SqsRecord) -> Self {
        Self {
            source: record.source().to_string(),
            receive_count: record.attributes.receive_count(),
            sent_at: record.attributes.sent_at(),
            id: record.message_id,
            body: record.body,
        }
    }
}
