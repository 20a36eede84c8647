use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::{ExtractError, ExtractOutput, Extractor};
use crate::job::JobDescriptor;
use crate::media;

/// Stand-in extractor used until a real transcoder is wired in.
///
/// Accepts any job whose source is a supported media file, logs what would
/// be produced and reports success.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExtractor;

impl SimulatedExtractor {
    pub fn new() -> Self {
        Self
    }

    fn output_location(job: &JobDescriptor) -> Result<String, ExtractError> {
        let url = Url::parse(&job.file_url).map_err(|e| ExtractError::Unsupported(e.to_string()))?;
        let name = media::file_name(&url)
            .filter(|name| media::is_media_file(name))
            .ok_or_else(|| ExtractError::Unsupported(format!("unsupported media source {}", job.file_url)))?;
        let stem = name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or("audio");
        Ok(format!("{}/{}.{}", job.job_id, stem, job.output_format))
    }
}

#[async_trait]
impl Extractor for SimulatedExtractor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn extract(&self, job: &JobDescriptor) -> Result<ExtractOutput, ExtractError> {
        let location = Self::output_location(job)?;
        info!(
            job_id = %job.job_id,
            file_url = %job.file_url,
            output_format = %job.output_format,
            quality = %job.quality,
            output = %location,
            "Simulating audio extraction"
        );
        if let Some(callback_url) = &job.callback_url {
            info!(job_id = %job.job_id, callback_url = %callback_url, "Callback delivery is left to the caller");
        }
        Ok(ExtractOutput {
            output_location: Some(location),
        })
    }
}
