pub mod archive;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod record_id;
pub mod recorder;
pub mod store;
pub mod transport;

pub use error::{IngestError, StoreError, TransportError};
pub use pipeline::{BatchError, BatchSummary, Pipeline, PipelineSettings};
