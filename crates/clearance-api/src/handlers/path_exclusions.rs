//! Path exclusion endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use clearance_domain::entities::NewPathExclusion;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    extract::{parse_id, ValidatedJson, ValidatedQuery},
    models::{
        CountResponse, CreatePathExclusionRequest, ErrorResponse, MessageResponse,
        PathExclusionDto, PathExclusionListResponse, PathExclusionQuery, PathExclusionResponse,
        UpdatePathExclusionRequest,
    },
    state::{username_of, AppState},
};

#[utoipa::path(
    get,
    path = "/path-exclusions",
    tag = "path-exclusions",
    security(("bearer" = [])),
    params(PathExclusionQuery),
    responses(
        (status = 200, description = "Matching path exclusions", body = PathExclusionListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_path_exclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PathExclusionQuery>,
) -> ApiResult<Json<PathExclusionListResponse>> {
    let exclusions = state
        .repos
        .path_exclusions
        .list(&query.into_list()?)
        .await?;
    let usernames = state.usernames().await?;
    Ok(Json(PathExclusionListResponse {
        path_exclusions: exclusions
            .into_iter()
            .map(|e| {
                let username = username_of(&usernames, e.user_id);
                PathExclusionDto::new(e, username)
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/path-exclusions/count",
    tag = "path-exclusions",
    security(("bearer" = [])),
    params(PathExclusionQuery),
    responses((status = 200, description = "Number of matches", body = CountResponse))
)]
pub async fn count_path_exclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PathExclusionQuery>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.repos.path_exclusions.count(&query.filter()).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    post,
    path = "/path-exclusions",
    tag = "path-exclusions",
    security(("bearer" = [])),
    request_body = CreatePathExclusionRequest,
    responses(
        (status = 201, description = "Path exclusion created", body = PathExclusionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn create_path_exclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePathExclusionRequest>,
) -> ApiResult<(StatusCode, Json<PathExclusionResponse>)> {
    let exclusion = state
        .curation()
        .create_path_exclusion(NewPathExclusion {
            purl: request.purl,
            pattern: request.pattern,
            reason: request.reason,
            comment: request.comment,
            user_id: auth.user.id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PathExclusionResponse {
            path_exclusion: PathExclusionDto::new(exclusion, auth.user.username),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/path-exclusions/{id}",
    tag = "path-exclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Path exclusion id")),
    request_body = UpdatePathExclusionRequest,
    responses(
        (status = 200, description = "Path exclusion updated", body = MessageResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown path exclusion", body = ErrorResponse)
    )
)]
pub async fn update_path_exclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdatePathExclusionRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let changes = request.into_changes()?;
    state
        .curation()
        .update_path_exclusion(&auth.actor(), id, changes)
        .await?;
    Ok(Json(MessageResponse::new("Path exclusion updated")))
}

#[utoipa::path(
    delete,
    path = "/path-exclusions/{id}",
    tag = "path-exclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Path exclusion id")),
    responses(
        (status = 200, description = "Path exclusion deleted", body = MessageResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown path exclusion", body = ErrorResponse)
    )
)]
pub async fn delete_path_exclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .curation()
        .delete_path_exclusion(&auth.actor(), parse_id(&id)?)
        .await?;
    Ok(Json(MessageResponse::new("Path exclusion deleted")))
}
