//! Bounded-concurrency worker pool executing job bodies.
//!
//! Submission pushes onto an unbounded queue and returns immediately; a fixed
//! number of workers drain it, so excess jobs wait in the backlog but are
//! never rejected. Only the worker owning a job writes its state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::jobs::{JobOutcome, JobState, JobStore};
use crate::services::orchestrator::PipelineError;

/// One queued pipeline execution.
#[derive(Debug)]
pub struct JobRequest {
    pub id: Uuid,
    pub city: String,
    pub task: String,
}

/// The job body the pool executes. Production wires the five-stage
/// orchestrator here; tests substitute fakes.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, city: &str, task: &str) -> Result<JobOutcome, PipelineError>;
}

/// Fixed-size pool of async workers fed from a shared queue.
#[derive(Clone)]
pub struct WorkerPool {
    tx: flume::Sender<JobRequest>,
    jobs: JobStore,
}

impl WorkerPool {
    pub fn spawn(workers: usize, jobs: JobStore, runner: Arc<dyn JobRunner>) -> Self {
        let (tx, rx) = flume::unbounded::<JobRequest>();

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let jobs = jobs.clone();
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                while let Ok(request) = rx.recv_async().await {
                    let JobRequest { id, city, task } = request;
                    info!(worker_id, %id, %city, "job started");
                    jobs.advance(id, JobState::Running);

                    match runner.run(&city, &task).await {
                        Ok(outcome) => {
                            info!(worker_id, %id, %city, "job finished");
                            jobs.advance(id, JobState::Success { data: outcome });
                        }
                        Err(err) => {
                            error!(worker_id, %id, %city, %err, "job failed");
                            jobs.advance(
                                id,
                                JobState::Error {
                                    error: err.to_string(),
                                },
                            );
                        }
                    }
                }
            });
        }

        Self { tx, jobs }
    }

    /// Register a PENDING job, enqueue it, and return its id without blocking.
    pub fn submit(&self, city: impl Into<String>, task: impl Into<String>) -> Uuid {
        let id = self.jobs.create();
        let request = JobRequest {
            id,
            city: city.into(),
            task: task.into(),
        };
        if self.tx.send(request).is_err() {
            // Only possible when every worker task has exited.
            self.jobs.advance(
                id,
                JobState::Error {
                    error: "worker pool is not running".to_owned(),
                },
            );
        }
        id
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }
}
