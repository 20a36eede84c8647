pub mod batch;
pub mod config;
pub mod events;
pub mod job;
pub mod media;
pub mod utils;
pub mod web;

use std::sync::Arc;

use batch::{BatchProcessor, Extractor, ProcessorOptions};
use config::Settings;
use job::JobDecoder;
use once_cell::sync::Lazy;

/// Crate version plus the git revision it was built from.
pub static BUILD_VERSION: Lazy<String> =
    Lazy::new(|| format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")));

pub struct AppContext {
    pub settings: Arc<Settings>,
    pub processor: Arc<BatchProcessor>,
}

impl AppContext {
    pub fn new(settings: Settings, extractor: Arc<dyn Extractor>) -> Self {
        let processor = BatchProcessor::new(extractor)
            .with_decoder(JobDecoder::new(settings.default_output_format.clone()))
            .with_options(ProcessorOptions {
                max_concurrency: settings.max_concurrency,
                record_timeout: settings.extract_timeout,
            });

        Self {
            settings: Arc::new(settings),
            processor: Arc::new(processor),
        }
    }
}

pub fn init_env() {
    dotenv::dotenv().ok();
}
