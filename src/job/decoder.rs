use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use url::Url;

use super::{JobDescriptor, JobField, Quality, DEFAULT_OUTPUT_FORMAT};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not valid JSON: {0}")]
    MalformedPayload(String),

    #[error("expected a JSON object, found {0}")]
    InvalidShape(&'static str),

    #[error("missing required field: {field}")]
    MissingRequiredField { field: JobField },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: JobField, reason: String },
}

impl DecodeError {
    pub fn field(&self) -> Option<JobField> {
        match self {
            DecodeError::MissingRequiredField { field } | DecodeError::InvalidField { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }

    fn invalid(field: JobField, reason: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Turns a raw message body into a [`JobDescriptor`].
///
/// Decoding is pure: the same body always produces the same result, and a
/// descriptor is only returned once every field has been validated.
#[derive(Debug, Clone)]
pub struct JobDecoder {
    default_output_format: String,
}

impl Default for JobDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_FORMAT)
    }
}

impl JobDecoder {
    pub fn new(default_output_format: impl Into<String>) -> Self {
        Self {
            default_output_format: default_output_format.into(),
        }
    }

    pub fn default_output_format(&self) -> &str {
        &self.default_output_format
    }

    pub fn decode(&self, body: &str) -> Result<JobDescriptor, DecodeError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

        let fields = match &value {
            Value::Object(fields) => fields,
            other => return Err(DecodeError::InvalidShape(json_kind(other))),
        };

        let job_id = required_str(fields, JobField::JobId)?;
        let file_url = required_str(fields, JobField::FileUrl)?;
        validate_url(&file_url).map_err(|reason| DecodeError::invalid(JobField::FileUrl, reason))?;

        let output_format = match optional(fields, JobField::OutputFormat) {
            None => self.default_output_format.clone(),
            Some(Value::String(format)) if !format.trim().is_empty() => format.trim().to_lowercase(),
            Some(Value::String(_)) => {
                return Err(DecodeError::invalid(JobField::OutputFormat, "must not be empty"))
            }
            Some(other) => {
                return Err(DecodeError::invalid(
                    JobField::OutputFormat,
                    format!("expected a string, found {}", json_kind(other)),
                ))
            }
        };

        let quality = match optional(fields, JobField::Quality) {
            None => Quality::default(),
            Some(Value::String(raw)) => Quality::parse(raw).ok_or_else(|| {
                DecodeError::invalid(
                    JobField::Quality,
                    format!("{:?} is not one of low, medium, high", raw),
                )
            })?,
            Some(other) => {
                return Err(DecodeError::invalid(
                    JobField::Quality,
                    format!("expected a string, found {}", json_kind(other)),
                ))
            }
        };

        let callback_url = match optional(fields, JobField::CallbackUrl) {
            None => None,
            Some(Value::String(raw)) => {
                validate_url(raw).map_err(|reason| DecodeError::invalid(JobField::CallbackUrl, reason))?;
                Some(raw.clone())
            }
            Some(other) => {
                return Err(DecodeError::invalid(
                    JobField::CallbackUrl,
                    format!("expected a string, found {}", json_kind(other)),
                ))
            }
        };

        let timestamp = match optional(fields, JobField::Timestamp) {
            None => None,
            Some(Value::String(raw)) => Some(
                parse_timestamp(raw)
                    .ok_or_else(|| DecodeError::invalid(JobField::Timestamp, format!("{:?} is not ISO-8601", raw)))?,
            ),
            Some(other) => {
                return Err(DecodeError::invalid(
                    JobField::Timestamp,
                    format!("expected a string, found {}", json_kind(other)),
                ))
            }
        };

        Ok(JobDescriptor {
            job_id,
            file_url,
            output_format,
            quality,
            callback_url,
            timestamp,
        })
    }
}

/// Decodes with the built-in default output format.
pub fn decode(body: &str) -> Result<JobDescriptor, DecodeError> {
    JobDecoder::default().decode(body)
}

// present, non-null, non-empty string; anything else counts as missing
fn required_str(fields: &Map<String, Value>, field: JobField) -> Result<String, DecodeError> {
    match fields.get(field.wire_key()) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(DecodeError::MissingRequiredField { field }),
    }
}

fn optional<'a>(fields: &'a Map<String, Value>, field: JobField) -> Option<&'a Value> {
    fields.get(field.wire_key()).filter(|value| !value.is_null())
}

fn validate_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("{:?} is not a URL: {}", raw, e))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(format!("{:?} has no host", raw)),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // no offset given: read as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
