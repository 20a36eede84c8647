use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::extractors::{panic_message, ExtractError, ExtractOutput, Extractor};
use super::types::{BatchError, BatchReport, FailureReason, QueueMessage, RecordOutcome};
use crate::job::{JobDecoder, JobDescriptor};

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Upper bound on records worked on at the same time.
    pub max_concurrency: usize,
    /// Limit applied to each extraction call.
    pub record_timeout: Option<Duration>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            record_timeout: None,
        }
    }
}

/// Runs a batch of queue messages through decode and extraction, isolating
/// failures per record and reporting outcomes in input order.
pub struct BatchProcessor {
    decoder: JobDecoder,
    extractor: Arc<dyn Extractor>,
    options: ProcessorOptions,
}

impl BatchProcessor {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            decoder: JobDecoder::default(),
            extractor,
            options: ProcessorOptions::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: JobDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    pub async fn process_batch(&self, messages: Vec<QueueMessage>) -> Result<BatchReport, BatchError> {
        self.process_batch_with_cancel(messages, CancellationToken::new())
            .await
    }

    /// Like [`process_batch`](Self::process_batch), but stops as soon as
    /// `cancel` fires. In-flight records are dropped and the outcomes that
    /// already finished come back inside [`BatchError::Cancelled`].
    pub async fn process_batch_with_cancel(
        &self,
        messages: Vec<QueueMessage>,
        cancel: CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let batch_id = Uuid::new_v4();
        let total = messages.len();
        let span = info_span!("batch", %batch_id, records = total, extractor = self.extractor.name());

        async move {
            info!("Received {} records for processing", total);

            let mut outcomes = Vec::with_capacity(total);
            // `buffered` yields in input order no matter which record finishes first
            let messages = &messages;
            let mut pending = stream::iter(0..total)
                .map(|index| self.process_record(index, &messages[index]).boxed())
                .buffered(self.options.max_concurrency.max(1));

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!("Batch cancelled with {}/{} records completed", outcomes.len(), total);
                        return Err(BatchError::Cancelled { completed: outcomes, total });
                    }
                    next = pending.next() => match next {
                        Some(outcome) => outcomes.push(outcome),
                        None => break,
                    },
                }
            }
            drop(pending);

            let report = BatchReport::from_outcomes(outcomes);
            verify_report(messages, &report)?;

            info!(
                status = %report.status,
                processed = report.processed_count,
                failed = total - report.processed_count,
                "Batch processed"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn process_record(&self, index: usize, message: &QueueMessage) -> RecordOutcome {
        debug!(index, message_id = %message.id, "Processing record");

        match AssertUnwindSafe(self.try_process(message)).catch_unwind().await {
            Ok(Ok(output)) => {
                debug!(
                    message_id = %message.id,
                    output = ?output.output_location,
                    "Record processed"
                );
                RecordOutcome::succeeded(message)
            }
            Ok(Err(reason)) => {
                warn!(
                    message_id = %message.id,
                    kind = %reason.kind,
                    detail = %reason.detail,
                    "Record failed"
                );
                RecordOutcome::failed(message, reason)
            }
            Err(panic) => {
                let error = ExtractError::Panicked(panic_message(panic.as_ref()));
                error!(message_id = %message.id, "{}", error);
                RecordOutcome::failed(message, FailureReason::from(&error))
            }
        }
    }

    async fn try_process(&self, message: &QueueMessage) -> Result<ExtractOutput, FailureReason> {
        let body = match message.body.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => return Err(FailureReason::empty_body()),
        };

        let job = self
            .decoder
            .decode(body)
            .map_err(|e| FailureReason::from(&e))?;

        debug!(
            message_id = %message.id,
            job_id = %job.job_id,
            receive_count = message.receive_count,
            "Decoded job"
        );

        self.extract(&job).await.map_err(|e| FailureReason::from(&e))
    }

    async fn extract(&self, job: &JobDescriptor) -> Result<ExtractOutput, ExtractError> {
        match self.options.record_timeout {
            Some(limit) => tokio::time::timeout(limit, self.extractor.extract(job))
                .await
                .map_err(|_| ExtractError::TimedOut(limit))?,
            None => self.extractor.extract(job).await,
        }
    }
}

/// Checks the one-outcome-per-message, same-order contract of a report.
pub(crate) fn verify_report(messages: &[QueueMessage], report: &BatchReport) -> Result<(), BatchError> {
    if report.records.len() != messages.len() {
        return Err(BatchError::Internal(format!(
            "expected {} outcomes, got {}",
            messages.len(),
            report.records.len()
        )));
    }

    let misplaced = messages
        .iter()
        .zip(&report.records)
        .position(|(message, outcome)| message.id != outcome.message_id);
    if let Some(index) = misplaced {
        return Err(BatchError::Internal(format!(
            "outcome {} belongs to {} instead of {}",
            index, report.records[index].message_id, messages[index].id
        )));
    }

    Ok(())
}
