//! Fixed five-stage pipeline: download → analyze → summarize → update-store →
//! package.
//!
//! Every stage reports its own checked failure; the orchestrator branches and
//! aborts the remaining stages on the first one. Converting a failure into job
//! ERROR state is the worker's job, not ours.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::paths::{AppPaths, PathError};
use crate::services::archive::{ArchiveError, zip_city_dir};
use crate::services::downloader::{DownloadError, PlanSource};
use crate::services::jobs::JobOutcome;
use crate::services::summarizer::{SummarizeError, Summarizer};
use crate::services::warehouse::{WarehouseError, WarehouseMerger};
use crate::services::worker::JobRunner;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("plan download failed: {0}")]
    Download(#[source] DownloadError),
    #[error("issues and trends analysis failed: {0}")]
    Analysis(#[source] SummarizeError),
    #[error("narrative summary failed: {0}")]
    Summary(#[source] SummarizeError),
    #[error("warehouse update failed: {0}")]
    Warehouse(#[source] WarehouseError),
    #[error("packaging failed: {0}")]
    Packaging(#[from] ArchiveError),
    #[error(transparent)]
    Paths(#[from] PathError),
}

/// Wires the stage services together for one municipality at a time.
pub struct Orchestrator {
    paths: AppPaths,
    source: Arc<dyn PlanSource>,
    summarizer: Summarizer,
    merger: WarehouseMerger,
}

impl Orchestrator {
    pub fn new(
        paths: AppPaths,
        source: Arc<dyn PlanSource>,
        summarizer: Summarizer,
        merger: WarehouseMerger,
    ) -> Self {
        Self {
            paths,
            source,
            summarizer,
            merger,
        }
    }
}

#[async_trait]
impl JobRunner for Orchestrator {
    async fn run(&self, city: &str, task: &str) -> Result<JobOutcome, PipelineError> {
        if !task.trim().is_empty() {
            // The pipeline shape is fixed; free-text augmentation is recorded
            // but does not alter the stage sequence.
            info!(%city, %task, "task augmentation noted");
        }

        info!(%city, "stage 1/5: downloading zoning plan");
        self.source
            .fetch(city)
            .await
            .map_err(PipelineError::Download)?;

        info!(%city, "stage 2/5: analyzing issues and trends");
        self.summarizer
            .analyze_issues_and_trends(city)
            .await
            .map_err(PipelineError::Analysis)?;

        info!(%city, "stage 3/5: generating narrative summary");
        self.summarizer
            .generate_summary(city)
            .await
            .map_err(PipelineError::Summary)?;

        info!(%city, "stage 4/5: updating warehouse table");
        self.merger
            .update_table(city)
            .await
            .map_err(PipelineError::Warehouse)?;

        info!(%city, "stage 5/5: packaging outputs");
        let city_dir = self.paths.city_dir(city)?;
        let zip_path = self.paths.zip_path(city)?;
        zip_city_dir(&city_dir, &zip_path)?;

        Ok(JobOutcome {
            city: city.to_owned(),
            download_url: format!("/download/{city}"),
        })
    }
}
