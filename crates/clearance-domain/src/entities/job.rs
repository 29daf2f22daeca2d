//! Scanner job entity and its state machine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// Lifecycle state of a scanner job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Created,
    Processing,
    Queued,
    Scanning,
    SavingResults,
    Completed,
    Failed,
}

impl JobStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Scanning => "scanning",
            Self::SavingResults => "savingResults",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the job still holds its packages
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Re-reporting the current non-terminal state is accepted so that agents
    /// can retry a status report.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed || next == *self {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created, Self::Processing)
                | (Self::Processing, Self::Queued)
                | (Self::Queued, Self::Scanning)
                | (Self::Scanning, Self::SavingResults)
                | (Self::SavingResults, Self::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scan request for one uploaded archive and the purls it contains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerJob {
    pub id: String,
    pub status: JobStatus,
    pub message: Option<String>,
    pub purls: Vec<String>,
    pub upload_key: String,
    pub package_ids: Vec<i64>,
    pub agent_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScannerJob {
    /// Create a job in the `created` state with a fresh uuid
    pub fn new(purls: Vec<String>, upload_key: String, package_ids: Vec<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Created,
            message: None,
            purls,
            upload_key,
            package_ids,
            agent_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: JobStatus, message: Option<String>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if message.is_some() {
            self.message = message;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScannerJob {
        ScannerJob::new(vec!["pkg:npm/a@1".to_string()], "a.tar.gz".to_string(), vec![1])
    }

    #[test]
    fn test_happy_path() {
        let mut job = job();
        for next in [
            JobStatus::Processing,
            JobStatus::Queued,
            JobStatus::Scanning,
            JobStatus::SavingResults,
            JobStatus::Completed,
        ] {
            job.transition(next, None).unwrap();
        }
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut job = job();
        let err = job.transition(JobStatus::Scanning, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(job.status, JobStatus::Created);
    }

    #[test]
    fn test_failure_from_any_active_state() {
        let mut job = job();
        job.transition(JobStatus::Processing, None).unwrap();
        job.transition(JobStatus::Failed, Some("disk full".into())).unwrap();
        assert_eq!(job.message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.transition(JobStatus::Failed, None).unwrap();
        assert!(job.transition(JobStatus::Failed, None).is_err());
        assert!(job.transition(JobStatus::Processing, None).is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::SavingResults).unwrap(),
            "\"savingResults\""
        );
        assert!(serde_json::from_str::<JobStatus>("\"saving_results\"").is_err());
    }
}
