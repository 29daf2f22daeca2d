//! Bulk conclusion endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use clearance_domain::entities::NewBulkConclusion;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    extract::{parse_id, ValidatedJson, ValidatedQuery},
    models::{
        AffectedFilesResponse, BulkConclusionDto, BulkConclusionListResponse,
        BulkConclusionQuery, BulkConclusionResponse, BulkCreatedResponse, BulkUpdatedResponse,
        CountResponse, CreateBulkConclusionRequest, ErrorResponse, MessageResponse,
        PreviewRequest, PreviewResponse, UpdateBulkConclusionRequest,
    },
    state::{username_of, AppState},
};

#[utoipa::path(
    get,
    path = "/bulk-conclusions",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(BulkConclusionQuery),
    responses(
        (status = 200, description = "Matching bulk conclusions", body = BulkConclusionListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_bulk_conclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<BulkConclusionQuery>,
) -> ApiResult<Json<BulkConclusionListResponse>> {
    let bulks = state
        .repos
        .bulk_conclusions
        .list(&query.into_list()?)
        .await?;
    let usernames = state.usernames().await?;
    Ok(Json(BulkConclusionListResponse {
        bulk_conclusions: bulks
            .into_iter()
            .map(|b| {
                let username = username_of(&usernames, b.user_id);
                BulkConclusionDto::new(b, username)
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/bulk-conclusions/count",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(BulkConclusionQuery),
    responses((status = 200, description = "Number of matches", body = CountResponse))
)]
pub async fn count_bulk_conclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<BulkConclusionQuery>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.repos.bulk_conclusions.count(&query.filter()).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/bulk-conclusions/{id}",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Bulk conclusion id")),
    responses(
        (status = 200, description = "The bulk conclusion", body = BulkConclusionResponse),
        (status = 404, description = "Unknown bulk conclusion", body = ErrorResponse)
    )
)]
pub async fn get_bulk_conclusion(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<BulkConclusionResponse>> {
    let bulk = state.bulk().get(parse_id(&id)?).await?;
    let username = state.username(bulk.user_id).await?;
    Ok(Json(BulkConclusionResponse {
        bulk_conclusion: BulkConclusionDto::new(bulk, username),
    }))
}

/// Paths concluded by a bulk conclusion, in its context package and elsewhere
#[utoipa::path(
    get,
    path = "/bulk-conclusions/{id}/affected-files",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Bulk conclusion id")),
    responses(
        (status = 200, description = "Affected files", body = AffectedFilesResponse),
        (status = 404, description = "Unknown bulk conclusion", body = ErrorResponse)
    )
)]
pub async fn affected_files(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<AffectedFilesResponse>> {
    let affected = state.bulk().affected_files(parse_id(&id)?).await?;
    Ok(Json(AffectedFilesResponse {
        affected_files: affected.into(),
    }))
}

/// Paths a pattern would match, without storing anything
#[utoipa::path(
    post,
    path = "/bulk-conclusions/preview",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Matched paths", body = PreviewResponse),
        (status = 400, description = "Invalid pattern or purl", body = ErrorResponse),
        (status = 404, description = "Unknown package", body = ErrorResponse)
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedJson(request): ValidatedJson<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let matched_paths = state.bulk().preview(&request.pattern, &request.purl).await?;
    Ok(Json(PreviewResponse { matched_paths }))
}

#[utoipa::path(
    post,
    path = "/bulk-conclusions",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    request_body = CreateBulkConclusionRequest,
    responses(
        (status = 201, description = "Bulk conclusion created", body = BulkCreatedResponse),
        (status = 400, description = "Invalid input or no matching files", body = ErrorResponse),
        (status = 404, description = "Unknown package", body = ErrorResponse)
    )
)]
pub async fn create_bulk_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateBulkConclusionRequest>,
) -> ApiResult<(StatusCode, Json<BulkCreatedResponse>)> {
    let created = state
        .bulk()
        .create(NewBulkConclusion {
            pattern: request.pattern,
            concluded_license_expression_spdx: request.concluded_license_expression_spdx,
            detected_license_expression_spdx: request.detected_license_expression_spdx,
            comment: request.comment,
            local: request.local.unwrap_or(false),
            context_purl: request.context_purl,
            user_id: auth.user.id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkCreatedResponse {
            bulk_conclusion_id: created.bulk_conclusion_id,
            matched_paths_count: created.matched_paths_count,
            added_license_conclusions_count: created.added_license_conclusions_count,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/bulk-conclusions/{id}",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Bulk conclusion id")),
    request_body = UpdateBulkConclusionRequest,
    responses(
        (status = 200, description = "Bulk conclusion updated", body = BulkUpdatedResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown bulk conclusion", body = ErrorResponse)
    )
)]
pub async fn update_bulk_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateBulkConclusionRequest>,
) -> ApiResult<Json<BulkUpdatedResponse>> {
    let id = parse_id(&id)?;
    let changes = request.into_changes()?;
    let updated = state.bulk().update(&auth.actor(), id, changes).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/bulk-conclusions/{id}",
    tag = "bulk-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Bulk conclusion id")),
    responses(
        (status = 200, description = "Bulk conclusion and its conclusions deleted", body = MessageResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown bulk conclusion", body = ErrorResponse)
    )
)]
pub async fn delete_bulk_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let removed = state.bulk().delete(&auth.actor(), parse_id(&id)?).await?;
    Ok(Json(MessageResponse::new(format!(
        "Bulk conclusion and {} license conclusions deleted",
        removed
    ))))
}
