//! Scanner job lifecycle

use tracing::{info, warn};

use crate::{
    entities::{JobStatus, ScanStatus, ScannerJob},
    errors::{DomainError, DomainResult},
    purl::Purl,
    repositories::Repositories,
};

#[derive(Clone)]
pub struct JobService {
    repos: Repositories,
}

impl JobService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Register a job for an uploaded archive and mark its packages pending
    pub async fn create(&self, upload_key: &str, purls: &[String]) -> DomainResult<ScannerJob> {
        if purls.is_empty() {
            return Err(DomainError::validation("purls", "at least one purl is required"));
        }
        let mut parsed = Vec::with_capacity(purls.len());
        for (i, purl) in purls.iter().enumerate() {
            parsed.push(Purl::parse(purl).map_err(|e| e.at_field(format!("purls[{}]", i)))?);
        }

        let mut package_ids = Vec::with_capacity(parsed.len());
        for purl in &parsed {
            let package = self.repos.packages.upsert(purl, ScanStatus::Pending).await?;
            package_ids.push(package.id);
        }

        let job = ScannerJob::new(
            parsed.iter().map(|p| p.as_str().to_string()).collect(),
            upload_key.to_string(),
            package_ids,
        );
        self.repos.jobs.create(&job).await?;
        info!(job_id = %job.id, purls = job.purls.len(), "Created scanner job");
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> DomainResult<ScannerJob> {
        self.repos
            .jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ScannerJob", id))
    }

    /// Move a job to `status`; failing a job fails its packages
    pub async fn transition(
        &self,
        id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> DomainResult<ScannerJob> {
        let job = self
            .repos
            .jobs
            .update(id, &|job| job.transition(status, message.clone()))
            .await?;

        if status == JobStatus::Failed {
            warn!(job_id = %job.id, message = ?job.message, "Scanner job failed");
            self.repos
                .packages
                .set_scan_status(&job.package_ids, ScanStatus::Failed)
                .await?;
        } else {
            info!(job_id = %job.id, status = %status, "Scanner job state changed");
        }
        Ok(job)
    }

    /// Remember the id the scanner agent gave the job
    pub async fn attach_agent_job(&self, id: &str, agent_job_id: &str) -> DomainResult<()> {
        self.repos
            .jobs
            .update(id, &|job| {
                job.agent_job_id = Some(agent_job_id.to_string());
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Fail a job unless it already finished
    pub async fn fail(&self, id: &str, message: impl Into<String>) -> DomainResult<()> {
        let job = self.get(id).await?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.transition(id, JobStatus::Failed, Some(message.into()))
            .await
            .map(|_| ())
    }
}
