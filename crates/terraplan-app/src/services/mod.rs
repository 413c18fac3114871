//! Orchestration layer for IO-bound pipeline services.
//!
//! Modules exposed here coordinate external systems (document source,
//! completion service, warehouse, archive) and must avoid embedding pure
//! transforms; those live under `crate::pipeline`.

pub mod archive;
pub mod completion;
pub mod downloader;
pub mod jobs;
pub mod orchestrator;
pub mod summarizer;
pub mod warehouse;
pub mod worker;

pub use archive::{ArchiveError, zip_city_dir};
pub use completion::{CompletionClient, CompletionError, OpenAiClient};
pub use downloader::{CsvLinkDownloader, DownloadError, PlanSource};
pub use jobs::{JobOutcome, JobState, JobStore};
pub use orchestrator::{Orchestrator, PipelineError};
pub use summarizer::{SummarizeError, Summarizer, SummarizerConfig};
pub use warehouse::{BigQueryRestClient, WarehouseClient, WarehouseError, WarehouseMerger};
pub use worker::{JobRequest, JobRunner, WorkerPool};
