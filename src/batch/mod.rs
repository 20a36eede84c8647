pub mod extractors;
pub mod processor;
pub mod types;

pub use types::{
    BatchError, BatchReport, BatchStatus, FailureKind, FailureReason, QueueMessage,
    RecordOutcome,
};

pub use extractors::{ExtractError, ExtractOutput, Extractor, FnExtractor, SimulatedExtractor};

pub use processor::{BatchProcessor, ProcessorOptions};

#[cfg(test)]
mod tests;
