pub mod simulated;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::job::JobDescriptor;

pub use simulated::SimulatedExtractor;

/// Success marker returned by an extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractOutput {
    pub output_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported job: {0}")]
    Unsupported(String),

    #[error("extraction failed: {0}")]
    Failed(String),

    #[error("extraction timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("record processing panicked: {0}")]
    Panicked(String),
}

/// The operation that turns one validated job into extracted audio.
///
/// Implementations may block for a long time (e.g. while a transcoder runs);
/// the batch processor applies its own timeout around them.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, job: &JobDescriptor) -> Result<ExtractOutput, ExtractError>;
}

/// Adapts a plain, possibly blocking, function into an [`Extractor`].
///
/// The function runs on the blocking thread pool so a slow transcoder call
/// cannot stall the runtime or the processor's timeout.
pub struct FnExtractor<F> {
    name: String,
    extract: Arc<F>,
}

impl<F> Clone for FnExtractor<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            extract: self.extract.clone(),
        }
    }
}

impl<F> FnExtractor<F>
where
    F: Fn(&JobDescriptor) -> Result<ExtractOutput, ExtractError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, extract: F) -> Self {
        Self {
            name: name.into(),
            extract: Arc::new(extract),
        }
    }
}

#[async_trait]
impl<F> Extractor for FnExtractor<F>
where
    F: Fn(&JobDescriptor) -> Result<ExtractOutput, ExtractError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, job: &JobDescriptor) -> Result<ExtractOutput, ExtractError> {
        let extract = self.extract.clone();
        let job = job.clone();

        match task::spawn_blocking(move || extract(&job)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ExtractError::Panicked(panic_message(e.into_panic().as_ref()))),
            Err(e) => Err(ExtractError::Failed(e.to_string())),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
