use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use terraplan_app::services::jobs::{JobOutcome, JobState, JobStore};
use terraplan_app::services::orchestrator::PipelineError;
use terraplan_app::services::worker::{JobRunner, WorkerPool};

struct SucceedingRunner;

#[async_trait]
impl JobRunner for SucceedingRunner {
    async fn run(&self, city: &str, _task: &str) -> Result<JobOutcome, PipelineError> {
        Ok(JobOutcome {
            city: city.to_owned(),
            download_url: format!("/download/{city}"),
        })
    }
}

struct FailingRunner;

#[async_trait]
impl JobRunner for FailingRunner {
    async fn run(&self, _city: &str, _task: &str) -> Result<JobOutcome, PipelineError> {
        Err(PipelineError::Packaging(
            terraplan_app::services::archive::ArchiveError::MissingDirectory {
                path: "/nonexistent".into(),
            },
        ))
    }
}

async fn wait_for_terminal(store: &JobStore, id: Uuid) -> JobState {
    for _ in 0..200 {
        if let Some(state) = store.get(id)
            && state.is_terminal()
        {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal state in time");
}

#[tokio::test]
async fn submitted_job_reaches_success_with_download_url() {
    let pool = WorkerPool::spawn(2, JobStore::new(), Arc::new(SucceedingRunner));

    let id = pool.submit("Dubno", "");
    assert!(pool.jobs().get(id).is_some(), "job registered at submit");

    let state = wait_for_terminal(pool.jobs(), id).await;
    match state {
        JobState::Success { data } => {
            assert_eq!(data.city, "Dubno");
            assert_eq!(data.download_url, "/download/Dubno");
        }
        other => panic!("expected SUCCESS, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_pipeline_surfaces_stage_error_message() {
    let pool = WorkerPool::spawn(1, JobStore::new(), Arc::new(FailingRunner));

    let id = pool.submit("Dubno", "");
    let state = wait_for_terminal(pool.jobs(), id).await;
    match state {
        JobState::Error { error } => {
            assert!(error.contains("packaging failed"), "got: {error}");
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn terminal_state_is_stable_after_completion() {
    let store = JobStore::new();
    let pool = WorkerPool::spawn(1, store.clone(), Arc::new(SucceedingRunner));

    let id = pool.submit("Ostrov", "");
    let first = wait_for_terminal(&store, id).await;

    // A worker bug re-advancing the job would be refused by the store.
    assert!(!store.advance(id, JobState::Running));
    assert_eq!(store.get(id), Some(first));
}

#[tokio::test]
async fn backlog_beyond_worker_count_is_fully_drained() {
    let pool = WorkerPool::spawn(1, JobStore::new(), Arc::new(SucceedingRunner));

    let ids: Vec<Uuid> = (0..8).map(|i| pool.submit(format!("Obec{i}"), "")).collect();
    for id in ids {
        let state = wait_for_terminal(pool.jobs(), id).await;
        assert!(matches!(state, JobState::Success { .. }));
    }
}

#[tokio::test]
async fn unknown_job_id_has_no_state() {
    let pool = WorkerPool::spawn(1, JobStore::new(), Arc::new(SucceedingRunner));
    assert_eq!(pool.jobs().get(Uuid::new_v4()), None);
}
