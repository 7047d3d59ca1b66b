pub mod fetcher;
pub mod pipeline;
pub mod types;

pub use fetcher::{HttpPageFetcher, PageFetcher};
pub use pipeline::{IngestReport, IngestionPipeline, PipelineState};
pub use types::RatingsPage;
