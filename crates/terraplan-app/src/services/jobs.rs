//! In-memory job registry shared by the HTTP layer and the worker pool.
//!
//! Each entry is written only by the single worker owning that job id and read
//! by any number of concurrent pollers, so a concurrent map is sufficient; no
//! per-key lock is required. State never regresses: PENDING → RUNNING →
//! {SUCCESS | ERROR}.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Lifecycle state of a pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum JobState {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success { data: JobOutcome },
    #[serde(rename = "ERROR")]
    Error { error: String },
}

/// Result payload visible to pollers once a job succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub city: String,
    pub download_url: String,
}

impl JobState {
    /// Position in the monotonic lifecycle; transitions may only increase.
    fn rank(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running => 1,
            JobState::Success { .. } | JobState::Error { .. } => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

/// Process-wide job-id-to-state map. Cheap to clone; clones share storage.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<Uuid, JobState>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in PENDING and hand back its id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.insert(id, JobState::Pending);
        id
    }

    /// Advance a job along the lifecycle. Backward transitions are refused and
    /// logged; they indicate a writer-discipline bug, not a recoverable state.
    pub fn advance(&self, id: Uuid, next: JobState) -> bool {
        match self.jobs.get_mut(&id) {
            Some(mut entry) => {
                if next.rank() <= entry.rank() {
                    warn!(%id, current = ?*entry, refused = ?next, "refusing backward job transition");
                    return false;
                }
                *entry = next;
                true
            }
            None => {
                warn!(%id, "attempted to advance unknown job");
                false
            }
        }
    }

    /// Current state, or `None` for an unknown id.
    pub fn get(&self, id: Uuid) -> Option<JobState> {
        self.jobs.get(&id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_state() -> JobState {
        JobState::Success {
            data: JobOutcome {
                city: "Dubno".into(),
                download_url: "/download/Dubno".into(),
            },
        }
    }

    #[test]
    fn lifecycle_advances_forward_only() {
        let store = JobStore::new();
        let id = store.create();
        assert_eq!(store.get(id), Some(JobState::Pending));

        assert!(store.advance(id, JobState::Running));
        assert!(store.advance(id, success_state()));
        assert!(store.get(id).expect("present").is_terminal());

        // Terminal states never regress.
        assert!(!store.advance(id, JobState::Running));
        assert!(!store.advance(
            id,
            JobState::Error {
                error: "late failure".into()
            }
        ));
        assert_eq!(store.get(id), Some(success_state()));
    }

    #[test]
    fn unknown_id_is_distinct_from_any_state() {
        let store = JobStore::new();
        assert_eq!(store.get(Uuid::new_v4()), None);
        assert!(!store.advance(Uuid::new_v4(), JobState::Running));
    }

    #[test]
    fn states_serialize_with_uppercase_tags() {
        let json = serde_json::to_value(success_state()).expect("serializes");
        assert_eq!(json["state"], "SUCCESS");
        assert_eq!(json["data"]["download_url"], "/download/Dubno");

        let json = serde_json::to_value(JobState::Error {
            error: "Stahování plánu selhalo".into(),
        })
        .expect("serializes");
        assert_eq!(json["state"], "ERROR");
    }
}
