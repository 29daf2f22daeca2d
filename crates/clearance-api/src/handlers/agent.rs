//! Routes of the standalone scanner-agent service
//!
//! The API drives the agent with these: queue a directory, poll a job, and
//! acknowledge that results were saved so the job can be forgotten.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use clearance_scanner::protocol::{
    AgentJobCreated, AgentJobRequest, AgentJobStatus, MessageResponse, ResultStateRequest,
};

use crate::{
    auth::ScannerAgentAuth,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    state::AgentState,
};

pub async fn add_job(
    State(state): State<AgentState>,
    _agent: ScannerAgentAuth,
    ValidatedJson(request): ValidatedJson<AgentJobRequest>,
) -> ApiResult<Json<AgentJobCreated>> {
    if request.directory.trim().is_empty() {
        return Err(ApiError::validation("directory", "directory must not be empty"));
    }
    let job = state.queue.add(&request.directory, &request.opts.job_id)?;
    info!(agent_job_id = %job.id, job_id = %request.opts.job_id, "Accepted scan job");
    Ok(Json(job.created()))
}

pub async fn job_status(
    State(state): State<AgentState>,
    _agent: ScannerAgentAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentJobStatus>> {
    state
        .queue
        .get(&id)
        .map(|job| Json(job.status()))
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", id)))
}

pub async fn result_state(
    State(state): State<AgentState>,
    _agent: ScannerAgentAuth,
    Path(id): Path<String>,
    ValidatedJson(_request): ValidatedJson<ResultStateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.queue.mark_saved(&id)?;
    Ok(Json(MessageResponse {
        message: format!("Results of job {} marked as saved", id),
    }))
}
