//! How the API hands scan work to the scanner agent

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::{
    client::AgentClient,
    error::{Result, ScannerError},
    protocol::{
        AgentJobCreated, AgentJobOptions, AgentJobRequest, AgentJobStatus, ResultState,
        ResultStateRequest,
    },
    queue::JobQueue,
};

/// Sender of scan jobs to an agent
#[async_trait]
pub trait ScanDispatcher: Send + Sync {
    /// Queue a scan of `directory` for the API job `job_id`; returns the
    /// agent's job id
    async fn dispatch(&self, directory: &Path, job_id: &str) -> Result<String>;

    async fn status(&self, agent_job_id: &str) -> Result<AgentJobStatus>;

    /// Tell the agent the results were saved
    async fn acknowledge(&self, agent_job_id: &str) -> Result<()>;
}

/// Dispatcher feeding a queue in the same process
#[derive(Clone)]
pub struct EmbeddedDispatcher {
    queue: JobQueue,
}

impl EmbeddedDispatcher {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ScanDispatcher for EmbeddedDispatcher {
    async fn dispatch(&self, directory: &Path, job_id: &str) -> Result<String> {
        Ok(self.queue.add(directory, job_id)?.id)
    }

    async fn status(&self, agent_job_id: &str) -> Result<AgentJobStatus> {
        self.queue
            .get(agent_job_id)
            .map(|job| job.status())
            .ok_or_else(|| ScannerError::JobNotFound(agent_job_id.to_string()))
    }

    async fn acknowledge(&self, agent_job_id: &str) -> Result<()> {
        self.queue.mark_saved(agent_job_id)
    }
}

/// Dispatcher calling a standalone agent's REST routes
pub struct HttpDispatcher {
    client: Arc<AgentClient>,
}

impl HttpDispatcher {
    pub fn new(client: Arc<AgentClient>) -> Self {
        Self { client }
    }
}

fn not_found_as(agent_job_id: &str, err: ScannerError) -> ScannerError {
    match err {
        ScannerError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND => {
            ScannerError::JobNotFound(agent_job_id.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl ScanDispatcher for HttpDispatcher {
    async fn dispatch(&self, directory: &Path, job_id: &str) -> Result<String> {
        let body = AgentJobRequest {
            directory: directory.to_string_lossy().into_owned(),
            opts: AgentJobOptions {
                job_id: job_id.to_string(),
            },
        };
        let created: AgentJobCreated = self
            .client
            .send_json(Method::POST, "job", &body)
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn status(&self, agent_job_id: &str) -> Result<AgentJobStatus> {
        let response = self
            .client
            .get(&format!("job/{}", agent_job_id))
            .await
            .map_err(|e| not_found_as(agent_job_id, e))?;
        Ok(response.json().await?)
    }

    async fn acknowledge(&self, agent_job_id: &str) -> Result<()> {
        let body = ResultStateRequest {
            state: ResultState::Saved,
        };
        self.client
            .send_json(Method::POST, &format!("result-state/{}", agent_job_id), &body)
            .await
            .map_err(|e| not_found_as(agent_job_id, e))?;
        Ok(())
    }
}
