//! How the scanner agent tells the API about job progress

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use clearance_domain::{
    entities::{JobStatus, ScanReport},
    services::{JobService, ScanIngestor},
    Repositories,
};

use crate::{
    client::AgentClient,
    error::Result,
    protocol::{JobResults, JobStateUpdate},
};

/// Receiver of job state changes and scan results
#[async_trait]
pub trait JobReporter: Send + Sync {
    /// Report a new state for the API job `job_id`
    async fn report_state(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<()>;

    /// Deliver the results of the API job `job_id`, scanned as the agent
    /// queue entry `agent_job_id`
    async fn report_results(
        &self,
        job_id: &str,
        agent_job_id: &str,
        report: ScanReport,
    ) -> Result<()>;
}

/// Reporter writing straight into the domain, for an agent running inside
/// the API process
#[derive(Clone)]
pub struct EmbeddedReporter {
    jobs: JobService,
    ingestor: ScanIngestor,
}

impl EmbeddedReporter {
    pub fn new(repos: Repositories) -> Self {
        Self {
            jobs: JobService::new(repos.clone()),
            ingestor: ScanIngestor::new(repos),
        }
    }
}

#[async_trait]
impl JobReporter for EmbeddedReporter {
    async fn report_state(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<()> {
        if status == JobStatus::Failed {
            let message = message.unwrap_or_else(|| "scan failed".to_string());
            self.jobs.fail(job_id, message).await?;
        } else {
            self.jobs.transition(job_id, status, message).await?;
        }
        Ok(())
    }

    async fn report_results(
        &self,
        job_id: &str,
        _agent_job_id: &str,
        report: ScanReport,
    ) -> Result<()> {
        self.ingestor.save_results(job_id, &report).await?;
        Ok(())
    }
}

/// Reporter calling the API's REST routes with the scanner-agent token
pub struct HttpReporter {
    client: Arc<AgentClient>,
}

impl HttpReporter {
    pub fn new(client: Arc<AgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobReporter for HttpReporter {
    async fn report_state(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<()> {
        let path = format!("job-state/{}", job_id);
        let body = JobStateUpdate::new(status, message);
        self.client
            .send_json(reqwest::Method::PUT, &path, &body)
            .await?;
        debug!(job_id, status = %status, "Reported job state");
        Ok(())
    }

    async fn report_results(
        &self,
        job_id: &str,
        agent_job_id: &str,
        report: ScanReport,
    ) -> Result<()> {
        let body = JobResults {
            id: job_id.to_string(),
            agent_job_id: Some(agent_job_id.to_string()),
            result: report,
        };
        self.client
            .send_json(reqwest::Method::POST, "job-results", &body)
            .await?;
        debug!(job_id, "Reported scan results");
        Ok(())
    }
}
