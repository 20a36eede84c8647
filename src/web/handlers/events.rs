use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::batch::BatchError;
use crate::events::SqsEvent;
use crate::utils::http::HttpResponse;
use crate::AppContext;

/// Accepts an SQS batch and answers with the batch report.
///
/// Record failures are part of a 200 response; only envelope or internal
/// errors (500) and an exceeded request deadline (504) are not.
pub async fn process_events(State(ctx): State<Arc<AppContext>>, body: Bytes) -> Response {
    let messages = match SqsEvent::from_slice(&body) {
        Ok(event) => event.into_messages(),
        Err(e) => {
            error!("Rejected batch: {}", e);
            return batch_error_response(e);
        }
    };

    info!("Received {} SQS records", messages.len());

    let cancel = CancellationToken::new();
    let processing = ctx.processor.process_batch_with_cancel(messages, cancel.clone());
    tokio::pin!(processing);

    let result = match ctx.settings.request_timeout {
        Some(limit) => tokio::select! {
            result = &mut processing => result,
            _ = tokio::time::sleep(limit) => {
                // the processor stops at once and hands back what already finished
                cancel.cancel();
                processing.await
            }
        },
        None => processing.await,
    };

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Batch failed: {}", e);
            batch_error_response(e)
        }
    }
}

fn batch_error_response(error: BatchError) -> Response {
    match error {
        BatchError::Cancelled { completed, total } => {
            let status = StatusCode::GATEWAY_TIMEOUT;
            let response = HttpResponse::new(
                status.as_u16(),
                format!("Batch deadline exceeded after {} of {} records", completed.len(), total),
                completed,
            );
            (status, Json(response)).into_response()
        }
        BatchError::InvalidEnvelope(_) | BatchError::Internal(_) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let response = HttpResponse::new(
                status.as_u16(),
                "Failed to process batch".to_string(),
                error.to_string(),
            );
            (status, Json(response)).into_response()
        }
    }
}
