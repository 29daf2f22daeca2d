//! JSON bodies exchanged between the API and the scanner agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearance_domain::entities::{JobStatus, ScanReport};

/// Options of a queued agent job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentJobOptions {
    /// API-side scanner job id
    pub job_id: String,
}

/// `POST /job` on the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentJobRequest {
    pub directory: String,
    pub opts: AgentJobOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentJobData {
    pub directory: String,
}

/// Response of `POST /job` on the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentJobCreated {
    pub id: String,
    pub name: String,
    pub data: AgentJobData,
    pub opts: AgentJobOptions,
}

/// State of a job inside the agent queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentJobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl AgentJobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Response of `GET /job/{id}` on the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentJobStatus {
    pub id: String,
    pub state: AgentJobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<DateTime<Utc>>,
}

/// `POST /result-state/{id}` on the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStateRequest {
    pub state: ResultState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    Saved,
}

/// `PUT /job-state/{id}` on the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateUpdate {
    pub data: JobStateData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateData {
    pub state: JobStateBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateBody {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStateUpdate {
    pub fn new(status: JobStatus, message: Option<String>) -> Self {
        Self {
            data: JobStateData {
                state: JobStateBody { status, message },
            },
        }
    }
}

/// `POST /job-results` on the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub id: String,
    /// Agent queue entry to acknowledge once the results are saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_job_id: Option<String>,
    pub result: ScanReport,
}

/// `{message}` body returned by both services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_update_shape() {
        let body = serde_json::to_value(JobStateUpdate::new(JobStatus::SavingResults, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"data": {"state": {"status": "savingResults"}}})
        );
    }

    #[test]
    fn test_job_results_name_the_agent_job() {
        let body = serde_json::json!({
            "id": "api-1",
            "agentJobId": "agent-1",
            "result": {
                "scanner": {"name": "clearance-scanner", "version": "0.1.0"},
                "startedAt": "2024-01-01T00:00:00Z",
                "finishedAt": "2024-01-01T00:00:01Z",
                "files": [],
                "issues": []
            }
        });
        let results: JobResults = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(results.agent_job_id.as_deref(), Some("agent-1"));

        let mut legacy = body;
        legacy.as_object_mut().unwrap().remove("agentJobId");
        let results: JobResults = serde_json::from_value(legacy).unwrap();
        assert_eq!(results.agent_job_id, None);
    }

    #[test]
    fn test_agent_job_status_omits_unfinished_time() {
        let status = AgentJobStatus {
            id: "1".to_string(),
            state: AgentJobState::Active,
            finished_on: None,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({"id": "1", "state": "active"})
        );
    }
}
