//! Scanner job API: uploads, jobs, agent reports and results
//!
//! A job moves `created -> processing` while its archive is unpacked into
//! the work directory, then `queued` once the scanner agent accepted it. The
//! agent reports `scanning` and delivers results through `/job-results`.

use std::path::PathBuf;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use clearance_domain::{entities::JobStatus, DomainError, Purl};
use clearance_scanner::archive;

use crate::{
    auth::{AdminUser, AuthUser, ScannerAgentAuth},
    error::{ApiError, ApiResult},
    extract::{ValidatedJson, ValidatedQuery},
    models::{
        CreateJobRequest, CreateJobResponse, ErrorResponse, JobResultsRequest, JobStateResponse,
        MessageResponse, PackageConfigurationResponse, PurlRequest, PurlsRequest,
        ScanResultsResponse, ScanResultsState, UpdateJobStateRequest, UploadSignature,
        UploadUrlRequest, UploadUrlResponse,
    },
    signing::{upload_path, validate_key},
    state::AppState,
};

/// Parse a non-empty list of purls into their canonical form
fn canonical_purls(purls: &[String]) -> ApiResult<Vec<String>> {
    if purls.is_empty() {
        return Err(ApiError::validation("purls", "at least one purl is required"));
    }
    purls
        .iter()
        .enumerate()
        .map(|(i, purl)| {
            Purl::parse(purl)
                .map(|p| p.as_str().to_string())
                .map_err(|e| ApiError::from(e.at_field(format!("purls[{}]", i))))
        })
        .collect()
}

/// Scan state and results of a set of purls
#[utoipa::path(
    post,
    path = "/scan-results",
    tag = "scanner",
    security(("bearer" = [])),
    request_body = PurlsRequest,
    responses(
        (status = 200, description = "Scan state and results", body = ScanResultsResponse),
        (status = 400, description = "Invalid purls", body = ErrorResponse)
    )
)]
pub async fn scan_results(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(request): ValidatedJson<PurlsRequest>,
) -> ApiResult<Json<ScanResultsResponse>> {
    let purls = canonical_purls(&request.purls)?;
    let outcome = state.aggregator().scan_results(&purls).await?;
    Ok(Json(ScanResultsResponse {
        purls,
        state: ScanResultsState {
            status: outcome.status,
            job_id: outcome.job_id,
        },
        results: outcome.results,
    }))
}

/// Forget the scan results of a package
#[utoipa::path(
    delete,
    path = "/scan-results",
    tag = "scanner",
    security(("bearer" = [])),
    request_body = PurlRequest,
    responses(
        (status = 200, description = "Results deleted", body = MessageResponse),
        (status = 404, description = "Unknown package", body = ErrorResponse)
    )
)]
pub async fn delete_scan_results(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<PurlRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.ingestor().delete_results(&request.purl).await?;
    Ok(Json(MessageResponse::new("Scan results deleted")))
}

/// Effective license conclusions and path exclusions of a package
#[utoipa::path(
    post,
    path = "/package-configuration",
    tag = "scanner",
    security(("bearer" = [])),
    request_body = PurlRequest,
    responses(
        (status = 200, description = "Package configuration", body = PackageConfigurationResponse),
        (status = 400, description = "Invalid purl", body = ErrorResponse)
    )
)]
pub async fn package_configuration(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(request): ValidatedJson<PurlRequest>,
) -> ApiResult<Json<PackageConfigurationResponse>> {
    let purl = Purl::parse(&request.purl)?;
    let configuration = state
        .aggregator()
        .package_configuration(purl.as_str())
        .await?;
    Ok(Json(configuration.into()))
}

/// Signed URL for uploading a package archive
#[utoipa::path(
    post,
    path = "/upload-url",
    tag = "scanner",
    security(("bearer" = [])),
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "Presigned URL, or a message when the object exists", body = UploadUrlResponse),
        (status = 400, description = "Invalid key", body = ErrorResponse)
    )
)]
pub async fn upload_url(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    validate_key(&request.key)?;
    let path = upload_path(&state.config.storage.upload_dir, &request.key);
    if tokio::fs::try_exists(&path).await? {
        return Ok(Json(UploadUrlResponse {
            success: false,
            presigned_url: None,
            message: Some(format!("An object with key '{}' already exists", request.key)),
        }));
    }

    let url = state.signer.presigned_url(&request.key, Utc::now())?;
    Ok(Json(UploadUrlResponse {
        success: true,
        presigned_url: Some(url),
        message: None,
    }))
}

/// Store an uploaded object through a signed URL
#[utoipa::path(
    put,
    path = "/uploads/{key}",
    tag = "scanner",
    params(("key" = String, Path, description = "Object key"), UploadSignature),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Object stored", body = MessageResponse),
        (status = 403, description = "Bad or expired signature", body = ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
    ValidatedQuery(signature): ValidatedQuery<UploadSignature>,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    validate_key(&key)?;
    state
        .signer
        .verify(&key, signature.expires, &signature.signature, Utc::now())?;

    let upload_dir = &state.config.storage.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await?;
    let partial = upload_dir.join(format!(".{}.part", key));
    tokio::fs::write(&partial, &body).await?;
    tokio::fs::rename(&partial, upload_path(upload_dir, &key)).await?;

    info!(key = %key, bytes = body.len(), "Stored upload");
    Ok(Json(MessageResponse::new("Upload complete")))
}

/// Create a scanner job for an uploaded archive
#[utoipa::path(
    post,
    path = "/job",
    tag = "scanner",
    security(("bearer" = [])),
    request_body = CreateJobRequest,
    responses(
        (status = 200, description = "Job created", body = CreateJobResponse),
        (status = 400, description = "Missing upload or invalid purls", body = ErrorResponse)
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateJobRequest>,
) -> ApiResult<Json<CreateJobResponse>> {
    validate_key(&request.zip_file_key).map_err(|e| e.at_path("zipFileKey"))?;
    let archive = upload_path(&state.config.storage.upload_dir, &request.zip_file_key);
    if !tokio::fs::try_exists(&archive).await? {
        return Err(ApiError::validation(
            "zipFileKey",
            format!("no upload found with key '{}'", request.zip_file_key),
        ));
    }
    let purls = canonical_purls(&request.purls)?;

    let job = state.jobs().create(&request.zip_file_key, &purls).await?;

    let task_state = state.clone();
    let job_id = job.id.clone();
    tokio::spawn(async move {
        if let Err(e) = prepare_job(&task_state, &job_id, archive).await {
            warn!(job_id = %job_id, error = %e, "Could not queue scanner job");
            if let Err(e) = task_state.jobs().fail(&job_id, e.to_string()).await {
                warn!(job_id = %job_id, error = %e, "Could not fail scanner job");
            }
        }
    });

    Ok(Json(CreateJobResponse {
        scanner_job_id: job.id,
    }))
}

/// Unpack the archive of a job and hand it to the scanner agent
async fn prepare_job(state: &AppState, job_id: &str, archive_path: PathBuf) -> ApiResult<()> {
    let jobs = state.jobs();
    jobs.transition(job_id, JobStatus::Processing, None).await?;

    let directory = state.config.storage.work_dir.join(job_id);
    let target = directory.clone();
    let unpacked = tokio::task::spawn_blocking(move || archive::unpack_file(&archive_path, &target))
        .await
        .map_err(|e| ApiError::Internal(format!("unpack task failed: {}", e)));
    let files = match unpacked {
        Ok(Ok(files)) => files,
        Ok(Err(e)) => {
            remove_directory(&directory).await;
            return Err(e.into());
        }
        Err(e) => {
            remove_directory(&directory).await;
            return Err(e);
        }
    };
    debug!(job_id, files, directory = %directory.display(), "Unpacked job archive");

    jobs.transition(job_id, JobStatus::Queued, None).await?;
    let agent_job_id = state.dispatcher.dispatch(&directory, job_id).await?;
    jobs.attach_agent_job(job_id, &agent_job_id).await?;
    info!(job_id, agent_job_id = %agent_job_id, "Queued scanner job");
    Ok(())
}

async fn remove_directory(directory: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir_all(directory).await {
        debug!(directory = %directory.display(), error = %e, "Could not remove job directory");
    }
}

/// State of a scanner job
#[utoipa::path(
    get,
    path = "/job-state/{id}",
    tag = "scanner",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Scanner job id")),
    responses(
        (status = 200, description = "Job state", body = JobStateResponse),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
pub async fn job_state(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStateResponse>> {
    Ok(Json(state.jobs().get(&id).await?.into()))
}

/// State report from the scanner agent
#[utoipa::path(
    put,
    path = "/job-state/{id}",
    tag = "scanner",
    security(("scanner_agent" = [])),
    params(("id" = String, Path, description = "Scanner job id")),
    request_body = UpdateJobStateRequest,
    responses(
        (status = 200, description = "State recorded", body = MessageResponse),
        (status = 400, description = "Illegal transition", body = ErrorResponse),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
pub async fn update_job_state(
    State(state): State<AppState>,
    _agent: ScannerAgentAuth,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateJobStateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let report = request.data.state;
    if report.status == JobStatus::Failed {
        let message = report
            .message
            .unwrap_or_else(|| "scan failed".to_string());
        state.ingestor().mark_failed(&id, &message).await?;
    } else {
        state
            .jobs()
            .transition(&id, report.status, report.message)
            .await
            .map_err(|e| match e {
                DomainError::InvalidStateTransition { .. } => {
                    ApiError::validation("data.state.status", e.to_string())
                }
                other => other.into(),
            })?;
    }
    Ok(Json(MessageResponse::new("Job state updated")))
}

/// Scan results from the scanner agent
#[utoipa::path(
    post,
    path = "/job-results",
    tag = "scanner",
    security(("scanner_agent" = [])),
    request_body = JobResultsRequest,
    responses(
        (status = 200, description = "Results saved", body = MessageResponse),
        (status = 400, description = "Job cannot take results", body = ErrorResponse),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
pub async fn job_results(
    State(state): State<AppState>,
    _agent: ScannerAgentAuth,
    ValidatedJson(request): ValidatedJson<JobResultsRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .ingestor()
        .save_results(&request.id, &request.result)
        .await?;

    // The agent may report before the dispatch returned and the job was attached
    let agent_job_id = match request.agent_job_id {
        Some(id) => Some(id),
        None => state.jobs().get(&request.id).await?.agent_job_id,
    };
    if let Some(agent_job_id) = agent_job_id {
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.acknowledge(&agent_job_id).await {
                warn!(agent_job_id = %agent_job_id, error = %e, "Could not acknowledge saved results");
            }
        });
    }
    Ok(Json(MessageResponse::new("Results saved")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_purls() {
        let purls = canonical_purls(&["pkg:npm/lodash@4.17.21".to_string()]).unwrap();
        assert_eq!(purls, vec!["pkg:npm/lodash@4.17.21"]);

        match canonical_purls(&[]).unwrap_err() {
            ApiError::Validation { path, .. } => assert_eq!(path.as_deref(), Some("purls")),
            other => panic!("unexpected {:?}", other),
        }
        let err = canonical_purls(&["pkg:npm/a@1".to_string(), "nope".to_string()]).unwrap_err();
        match err {
            ApiError::Validation { path, .. } => assert_eq!(path.as_deref(), Some("purls[1]")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
