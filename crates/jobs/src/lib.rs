//! In-memory asynchronous job runner for generation requests. Each job owns
//! its private solver invocation and cancellation token; the runner shares
//! nothing across jobs except the status map.

use parking_lot::RwLock;
use std::collections::HashMap;
use timetable_core::{CancelToken, SolveEnvelope, SolveOutcome, Solver};
use tracing::error;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobId(pub String);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished { outcome: SolveOutcome },
    Failed { message: String },
}

struct JobEntry {
    status: JobStatus,
    cancel: CancelToken,
}

pub struct InMemJobs<S: Solver> {
    inner: std::sync::Arc<RwLock<HashMap<String, JobEntry>>>,
    solver: std::sync::Arc<S>,
}

impl<S: Solver> Clone for InMemJobs<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            solver: self.solver.clone(),
        }
    }
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: std::sync::Arc::new(solver),
        }
    }

    pub fn enqueue(&self, env: SolveEnvelope) -> JobId {
        let id = Uuid::new_v4().to_string();
        let cancel = CancelToken::new();
        self.inner.write().insert(
            id.clone(),
            JobEntry { status: JobStatus::Queued, cancel: cancel.clone() },
        );

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            if let Some(entry) = map.write().get_mut(&id_for_task) {
                entry.status = JobStatus::Running;
            }
            match solver.solve(env, cancel).await {
                Ok(outcome) => {
                    if let Some(entry) = map.write().get_mut(&id_for_task) {
                        entry.status = JobStatus::Finished { outcome };
                    }
                }
                Err(e) => {
                    error!(?e, "job failed");
                    if let Some(entry) = map.write().get_mut(&id_for_task) {
                        entry.status = JobStatus::Failed { message: e.to_string() };
                    }
                }
            }
        });

        JobId(id)
    }

    /// Flips the job's cancellation token; the engine observes it at its
    /// next unit-commitment boundary. Returns false for unknown ids.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.inner.read().get(&id.0) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &JobId) -> Option<JobStatus> {
        self.inner.read().get(&id.0).map(|e| e.status.clone())
    }
}
