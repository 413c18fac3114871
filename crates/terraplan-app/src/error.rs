//! Application-level error type shared by the binary entrypoints.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::AppConfigError;
use crate::paths::PathError;
use crate::pdf::PdfTextError;
use crate::server::ServerError;
use crate::services::{
    ArchiveError, CompletionError, DownloadError, PipelineError, SummarizeError, WarehouseError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] AppConfigError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error(transparent)]
    Pdf(#[from] PdfTextError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to read input file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
