//! Bounded job queue with a pool of worker tasks
//!
//! ```text
//! add() ──► mpsc (capacity) ──► worker 1..n ──► JobProcessor::process
//!                                   │
//!            waiting ─► active ─► completed | failed ─► removed once saved
//! ```

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, ScannerError},
    protocol::{AgentJobCreated, AgentJobData, AgentJobOptions, AgentJobState, AgentJobStatus},
};

/// Name given to every queued job
pub const SCAN_JOB_NAME: &str = "scan";

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 64,
        }
    }
}

/// A job known to the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: String,
    pub name: String,
    pub directory: PathBuf,
    /// Scanner job id on the API side
    pub api_job_id: String,
    pub state: AgentJobState,
    pub finished_on: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    /// Results were saved by the API; the job goes away once finished
    saved: bool,
}

impl QueuedJob {
    fn new(directory: PathBuf, api_job_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: SCAN_JOB_NAME.to_string(),
            directory,
            api_job_id,
            state: AgentJobState::Waiting,
            finished_on: None,
            failed_reason: None,
            saved: false,
        }
    }

    pub fn status(&self) -> AgentJobStatus {
        AgentJobStatus {
            id: self.id.clone(),
            state: self.state,
            finished_on: self.finished_on,
        }
    }

    pub fn created(&self) -> AgentJobCreated {
        AgentJobCreated {
            id: self.id.clone(),
            name: self.name.clone(),
            data: AgentJobData {
                directory: self.directory.to_string_lossy().into_owned(),
            },
            opts: AgentJobOptions {
                job_id: self.api_job_id.clone(),
            },
        }
    }
}

/// Work done for each job by the pool
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &QueuedJob) -> Result<()>;
}

type JobTable = Arc<RwLock<HashMap<String, QueuedJob>>>;

/// Handle to the queue; clones share the same jobs and workers
#[derive(Clone)]
pub struct JobQueue {
    jobs: JobTable,
    sender: mpsc::Sender<String>,
}

impl JobQueue {
    /// Create the queue and spawn its workers on the current runtime
    pub fn start(config: QueueConfig, processor: Arc<dyn JobProcessor>) -> Self {
        let (sender, receiver) = mpsc::channel::<String>(config.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));

        for worker_id in 0..config.workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let jobs = Arc::clone(&jobs);
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(id) = next else {
                        break;
                    };
                    run_job(&jobs, processor.as_ref(), &id, worker_id).await;
                }
                debug!(worker_id, "Scanner worker stopped");
            });
        }
        info!(workers = config.workers, capacity = config.capacity, "Started scanner job queue");

        Self { jobs, sender }
    }

    /// Queue a scan of `directory` for the API job `api_job_id`
    pub fn add(&self, directory: impl Into<PathBuf>, api_job_id: &str) -> Result<QueuedJob> {
        let job = QueuedJob::new(directory.into(), api_job_id.to_string());
        self.jobs.write().insert(job.id.clone(), job.clone());

        if let Err(e) = self.sender.try_send(job.id.clone()) {
            self.jobs.write().remove(&job.id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => ScannerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ScannerError::QueueClosed,
            });
        }
        debug!(agent_job_id = %job.id, job_id = api_job_id, "Queued scan job");
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<QueuedJob> {
        self.jobs.read().get(id).cloned()
    }

    /// Record that the API saved the results of job `id`.
    ///
    /// Finished jobs are removed at once, unfinished ones when they finish.
    pub fn mark_saved(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| ScannerError::JobNotFound(id.to_string()))?;
        if job.state.is_finished() {
            jobs.remove(id);
        } else {
            job.saved = true;
        }
        Ok(())
    }

    /// Number of jobs per state
    pub fn counts(&self) -> HashMap<AgentJobState, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.read().values() {
            *counts.entry(job.state).or_insert(0) += 1;
        }
        counts
    }
}

async fn run_job(jobs: &JobTable, processor: &dyn JobProcessor, id: &str, worker_id: usize) {
    let job = {
        let mut jobs = jobs.write();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        job.state = AgentJobState::Active;
        job.clone()
    };
    debug!(worker_id, agent_job_id = id, job_id = %job.api_job_id, "Processing scan job");

    let outcome = processor.process(&job).await;

    let mut jobs = jobs.write();
    let Some(job) = jobs.get_mut(id) else {
        return;
    };
    job.finished_on = Some(Utc::now());
    match outcome {
        Ok(()) => job.state = AgentJobState::Completed,
        Err(e) => {
            warn!(agent_job_id = id, job_id = %job.api_job_id, error = %e, "Scan job failed");
            job.state = AgentJobState::Failed;
            job.failed_reason = Some(e.to_string());
        }
    }
    if job.saved {
        jobs.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Outcome(bool);

    #[async_trait]
    impl JobProcessor for Outcome {
        async fn process(&self, _job: &QueuedJob) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.0 {
                Ok(())
            } else {
                Err(ScannerError::Report("boom".to_string()))
            }
        }
    }

    /// Never finishes
    struct Stuck;

    #[async_trait]
    impl JobProcessor for Stuck {
        async fn process(&self, _job: &QueuedJob) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    async fn finished(queue: &JobQueue, id: &str) -> QueuedJob {
        for _ in 0..200 {
            if let Some(job) = queue.get(id) {
                if job.state.is_finished() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_completed_job_stays_until_saved() {
        let queue = JobQueue::start(QueueConfig::default(), Arc::new(Outcome(true)));
        let job = queue.add("/tmp/scan", "api-1").unwrap();
        assert_eq!(job.state, AgentJobState::Waiting);
        assert_eq!(job.created().opts.job_id, "api-1");

        let done = finished(&queue, &job.id).await;
        assert_eq!(done.state, AgentJobState::Completed);
        assert!(done.finished_on.is_some());

        queue.mark_saved(&job.id).unwrap();
        assert!(queue.get(&job.id).is_none());
        assert!(matches!(queue.mark_saved(&job.id), Err(ScannerError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_job_keeps_reason() {
        let queue = JobQueue::start(QueueConfig::default(), Arc::new(Outcome(false)));
        let job = queue.add("/tmp/scan", "api-2").unwrap();
        let done = finished(&queue, &job.id).await;
        assert_eq!(done.state, AgentJobState::Failed);
        assert!(done.failed_reason.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_saved_before_finish_removes_on_finish() {
        let queue = JobQueue::start(QueueConfig::default(), Arc::new(Outcome(true)));
        let job = queue.add("/tmp/scan", "api-3").unwrap();
        queue.mark_saved(&job.id).unwrap();
        for _ in 0..200 {
            if queue.get(&job.id).is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job was not removed");
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let config = QueueConfig {
            workers: 1,
            capacity: 1,
        };
        let queue = JobQueue::start(config, Arc::new(Stuck));
        queue.add("/a", "1").unwrap();
        // let the worker take the first job so the channel is empty again
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add("/b", "2").unwrap();
        assert!(matches!(queue.add("/c", "3"), Err(ScannerError::QueueFull)));
        assert_eq!(queue.counts().get(&AgentJobState::Active), Some(&1));
        assert_eq!(queue.counts().get(&AgentJobState::Waiting), Some(&1));
    }
}
