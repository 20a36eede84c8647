use super::*;
use super::processor::verify_report;
use crate::job::{JobDescriptor, JobField};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const SOURCE: &str = "arn:aws:sqs:us-east-1:123456789012:audio-jobs";

fn job_body(job_id: &str) -> String {
    format!(
        r#"{{"job_id":"{}","file_url":"https://media.example.com/{}.mp4"}}"#,
        job_id, job_id
    )
}

fn message(id: &str, body: &str) -> QueueMessage {
    QueueMessage::new(id, body, SOURCE)
}

// always succeeds, failing only jobs whose id starts with "fail"
fn processor() -> BatchProcessor {
    let extractor = FnExtractor::new("test", |job: &JobDescriptor| {
        if job.job_id.starts_with("fail") {
            Err(ExtractError::Failed(format!("transcoder rejected {}", job.job_id)))
        } else {
            Ok(ExtractOutput::default())
        }
    });
    BatchProcessor::new(Arc::new(extractor))
}

/// Sleeps for the number of milliseconds given in the job id and tracks how
/// many extractions overlap.
#[derive(Default)]
struct SleepyExtractor {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl Extractor for SleepyExtractor {
    fn name(&self) -> &str {
        "sleepy"
    }

    async fn extract(&self, job: &JobDescriptor) -> Result<ExtractOutput, ExtractError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let millis: u64 = job.job_id.parse().unwrap_or(0);
        sleep(Duration::from_millis(millis)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ExtractOutput::default())
    }
}

#[tokio::test]
async fn test_empty_batch_is_success() {
    let report = processor().process_batch(vec![]).await.unwrap();

    assert_eq!(report.status, BatchStatus::Success);
    assert_eq!(report.processed_count, 0);
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn test_all_valid_records_succeed() {
    let messages = vec![
        message("m-1", &job_body("1")),
        message("m-2", &job_body("2")),
    ];
    let report = processor().process_batch(messages).await.unwrap();

    assert_eq!(report.status, BatchStatus::Success);
    assert_eq!(report.processed_count, 2);
    assert!(report.records.iter().all(|r| r.processed && r.failure_reason.is_none()));
    assert_eq!(report.records[0].source, SOURCE);
}

#[tokio::test]
async fn test_malformed_record_does_not_affect_valid_one() {
    let messages = vec![message("bad", "not json"), message("good", &job_body("9"))];
    let report = processor().process_batch(messages).await.unwrap();

    let bad = &report.records[0];
    assert_eq!(bad.message_id, "bad");
    assert!(!bad.processed);
    assert_eq!(bad.body_length, "not json".len());
    assert_eq!(
        bad.failure_reason.as_ref().map(|r| r.kind),
        Some(FailureKind::MalformedPayload)
    );

    let good = &report.records[1];
    assert_eq!(good.message_id, "good");
    assert!(good.processed);
    assert_eq!(report.status, BatchStatus::Partial);
}

#[tokio::test]
async fn test_mixed_batch_reports_partial_in_order() {
    let messages = vec![
        message("m-1", "{\"job_id\":"),
        message("m-2", &job_body("fail-1")),
        message("m-3", &job_body("3")),
    ];
    let report = processor().process_batch(messages).await.unwrap();

    assert_eq!(report.status, BatchStatus::Partial);
    assert_eq!(report.processed_count, 1);
    let ids: Vec<_> = report.records.iter().map(|r| r.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m-1", "m-2", "m-3"]);

    let kinds: Vec<_> = report
        .records
        .iter()
        .map(|r| r.failure_reason.as_ref().map(|reason| reason.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(FailureKind::MalformedPayload),
            Some(FailureKind::ExtractionFailed),
            None
        ]
    );
    let detail = &report.records[1].failure_reason.as_ref().unwrap().detail;
    assert!(detail.contains("transcoder rejected fail-1"));
    assert_eq!(report.failed_message_ids(), vec!["m-1", "m-2"]);
}

#[tokio::test]
async fn test_every_record_failing_is_failure() {
    let mut absent = message("m-3", "");
    absent.body = None;
    let messages = vec![
        message("m-1", ""),
        message("m-2", r#"{"job_id":"","file_url":"https://x.com/a.mp4"}"#),
        absent,
        message("m-4", r#"{"job_id":"1","file_url":"not-a-url"}"#),
        message("m-5", "[]"),
    ];
    let report = processor().process_batch(messages).await.unwrap();

    assert_eq!(report.status, BatchStatus::Failure);
    assert_eq!(report.processed_count, 0);

    let reasons: Vec<_> = report
        .records
        .iter()
        .map(|r| {
            let reason = r.failure_reason.clone().unwrap();
            (reason.kind, reason.field)
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            (FailureKind::EmptyBody, None),
            (FailureKind::MissingRequiredField, Some(JobField::JobId)),
            (FailureKind::EmptyBody, None),
            (FailureKind::InvalidField, Some(JobField::FileUrl)),
            (FailureKind::InvalidShape, None),
        ]
    );
    assert_eq!(report.records[2].body_length, 0);
}

#[tokio::test]
async fn test_decode_failure_skips_extraction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let extractor = FnExtractor::new("counting", move |_: &JobDescriptor| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractOutput::default())
    });
    let processor = BatchProcessor::new(Arc::new(extractor));

    let messages = vec![
        message("m-1", "oops"),
        message("m-2", r#"{"job_id":"1","file_url":"https://x.com/a","quality":"ultra"}"#),
        message("m-3", &job_body("3")),
    ];
    let report = processor.process_batch(messages).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.records[1].failure_reason.as_ref().map(|r| (r.kind, r.field)),
        Some((FailureKind::InvalidField, Some(JobField::Quality)))
    );
}

#[tokio::test]
async fn test_concurrent_records_keep_input_order() {
    let extractor = Arc::new(SleepyExtractor::default());
    let processor = BatchProcessor::new(extractor.clone()).with_options(ProcessorOptions {
        max_concurrency: 2,
        record_timeout: None,
    });

    // later records finish first
    let delays = ["60", "40", "20", "10", "5", "1"];
    let messages: Vec<_> = delays
        .iter()
        .enumerate()
        .map(|(i, delay)| message(&format!("m-{}", i), &job_body(delay)))
        .collect();
    let report = processor.process_batch(messages).await.unwrap();

    let ids: Vec<_> = report.records.iter().map(|r| r.message_id.clone()).collect();
    assert_eq!(ids, vec!["m-0", "m-1", "m-2", "m-3", "m-4", "m-5"]);
    assert_eq!(report.processed_count, delays.len());
    assert!(extractor.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_record_timeout_fails_only_slow_record() {
    let processor = BatchProcessor::new(Arc::new(SleepyExtractor::default())).with_options(ProcessorOptions {
        max_concurrency: 4,
        record_timeout: Some(Duration::from_millis(50)),
    });

    let messages = vec![message("slow", &job_body("2000")), message("fast", &job_body("1"))];
    let report = processor.process_batch(messages).await.unwrap();

    let slow = report.records[0].failure_reason.as_ref().unwrap();
    assert_eq!(slow.kind, FailureKind::ExtractionFailed);
    assert!(slow.detail.contains("timed out"));
    assert!(report.records[1].processed);
    assert_eq!(report.status, BatchStatus::Partial);
}

#[tokio::test]
async fn test_whitespace_body_is_malformed_not_empty() {
    let report = processor()
        .process_batch(vec![message("m", "   ")])
        .await
        .unwrap();

    let record = &report.records[0];
    assert_eq!(record.body_length, 3);
    assert_eq!(
        record.failure_reason.as_ref().map(|r| r.kind),
        Some(FailureKind::MalformedPayload)
    );
}

#[tokio::test]
async fn test_blocking_extractor_times_out_in_parallel() {
    let extractor = FnExtractor::new("blocking", |_: &JobDescriptor| {
        std::thread::sleep(Duration::from_millis(1000));
        Ok(ExtractOutput::default())
    });
    let processor = BatchProcessor::new(Arc::new(extractor)).with_options(ProcessorOptions {
        max_concurrency: 4,
        record_timeout: Some(Duration::from_millis(50)),
    });

    let started = Instant::now();
    let report = processor
        .process_batch(vec![message("m-1", &job_body("1")), message("m-2", &job_body("2"))])
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(800), "batch took {:?}", elapsed);
    assert_eq!(report.status, BatchStatus::Failure);
    for record in &report.records {
        let reason = record.failure_reason.as_ref().unwrap();
        assert_eq!(reason.kind, FailureKind::ExtractionFailed);
        assert!(reason.detail.contains("timed out"));
    }
}

#[tokio::test]
async fn test_blocking_extractor_does_not_delay_cancel() {
    let extractor = FnExtractor::new("blocking", |_: &JobDescriptor| {
        std::thread::sleep(Duration::from_millis(1000));
        Ok(ExtractOutput::default())
    });
    let processor = BatchProcessor::new(Arc::new(extractor));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = processor
        .process_batch_with_cancel(vec![message("m-1", &job_body("1"))], cancel)
        .await;

    assert!(started.elapsed() < Duration::from_millis(800));
    assert!(matches!(result, Err(BatchError::Cancelled { ref completed, total: 1 }) if completed.is_empty()));
}

#[tokio::test]
async fn test_panicking_extractor_is_isolated() {
    let extractor = FnExtractor::new("fragile", |job: &JobDescriptor| {
        if job.job_id == "boom" {
            panic!("extractor exploded");
        }
        Ok(ExtractOutput::default())
    });
    let processor = BatchProcessor::new(Arc::new(extractor));

    let messages = vec![message("m-1", &job_body("boom")), message("m-2", &job_body("ok"))];
    let report = processor.process_batch(messages).await.unwrap();

    let reason = report.records[0].failure_reason.as_ref().unwrap();
    assert_eq!(reason.kind, FailureKind::ExtractionFailed);
    assert!(reason.detail.contains("extractor exploded"));
    assert!(report.records[1].processed);
}

#[tokio::test]
async fn test_cancel_returns_completed_prefix() {
    let processor = BatchProcessor::new(Arc::new(SleepyExtractor::default())).with_options(ProcessorOptions {
        max_concurrency: 1,
        record_timeout: None,
    });
    let messages = vec![
        message("m-1", &job_body("1")),
        message("m-2", &job_body("5000")),
        message("m-3", &job_body("1")),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    match processor.process_batch_with_cancel(messages, cancel).await {
        Err(BatchError::Cancelled { completed, total }) => {
            assert_eq!(total, 3);
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].message_id, "m-1");
            assert!(completed[0].processed);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_already_cancelled_batch_does_no_work() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let processor = BatchProcessor::new(Arc::new(FnExtractor::new("counting", move |_: &JobDescriptor| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractOutput::default())
    })));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = processor
        .process_batch_with_cancel(vec![message("m-1", &job_body("1"))], cancel)
        .await;

    assert!(matches!(result, Err(BatchError::Cancelled { ref completed, .. }) if completed.is_empty()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_configured_decoder_default_format_reaches_extractor() {
    let extractor = FnExtractor::new("format-check", |job: &JobDescriptor| {
        if job.output_format == "ogg" {
            Ok(ExtractOutput::default())
        } else {
            Err(ExtractError::Unsupported(job.output_format.clone()))
        }
    });
    let processor = BatchProcessor::new(Arc::new(extractor)).with_decoder(crate::job::JobDecoder::new("ogg"));

    let report = processor
        .process_batch(vec![message("m-1", &job_body("1"))])
        .await
        .unwrap();
    assert_eq!(report.status, BatchStatus::Success);
}

#[test]
fn test_verify_report_detects_broken_invariants() {
    let messages = vec![message("a", "{}"), message("b", "{}")];

    let short = BatchReport::from_outcomes(vec![RecordOutcome::succeeded(&messages[0])]);
    assert!(matches!(
        verify_report(&messages, &short),
        Err(BatchError::Internal(_))
    ));

    let swapped = BatchReport::from_outcomes(vec![
        RecordOutcome::succeeded(&messages[1]),
        RecordOutcome::succeeded(&messages[0]),
    ]);
    assert!(matches!(
        verify_report(&messages, &swapped),
        Err(BatchError::Internal(_))
    ));

    let ok = BatchReport::from_outcomes(vec![
        RecordOutcome::succeeded(&messages[0]),
        RecordOutcome::succeeded(&messages[1]),
    ]);
    assert!(verify_report(&messages, &ok).is_ok());
}
