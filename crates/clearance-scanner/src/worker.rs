//! Scan worker: scans a job directory and reports back to the API

use std::{fs, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use clearance_domain::entities::JobStatus;

use crate::{
    error::{Result, ScannerError},
    queue::{JobProcessor, QueuedJob},
    reporter::JobReporter,
    scan::scan_directory,
};

pub struct ScanWorker {
    reporter: Arc<dyn JobReporter>,
    /// Delete the job directory once the job is done
    remove_directories: bool,
}

impl ScanWorker {
    pub fn new(reporter: Arc<dyn JobReporter>) -> Self {
        Self {
            reporter,
            remove_directories: true,
        }
    }

    pub fn keep_directories(mut self) -> Self {
        self.remove_directories = false;
        self
    }

    async fn scan_and_report(&self, job: &QueuedJob) -> Result<()> {
        self.reporter
            .report_state(&job.api_job_id, JobStatus::Scanning, None)
            .await?;

        let directory = job.directory.clone();
        let report = tokio::task::spawn_blocking(move || scan_directory(&directory))
            .await
            .map_err(|e| ScannerError::Io(std::io::Error::other(e.to_string())))??;
        info!(
            job_id = %job.api_job_id,
            files = report.files.len(),
            issues = report.issues.len(),
            "Scan finished"
        );

        self.reporter
            .report_results(&job.api_job_id, &job.id, report)
            .await
    }
}

#[async_trait]
impl JobProcessor for ScanWorker {
    async fn process(&self, job: &QueuedJob) -> Result<()> {
        let outcome = self.scan_and_report(job).await;

        if let Err(e) = &outcome {
            if let Err(report_err) = self
                .reporter
                .report_state(&job.api_job_id, JobStatus::Failed, Some(e.to_string()))
                .await
            {
                warn!(job_id = %job.api_job_id, error = %report_err, "Could not report failure");
            }
        }

        if self.remove_directories {
            match fs::remove_dir_all(&job.directory) {
                Ok(()) => debug!(directory = %job.directory.display(), "Removed job directory"),
                Err(e) => warn!(directory = %job.directory.display(), error = %e, "Could not remove job directory"),
            }
        }
        outcome
    }
}
