//! License conclusion endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use clearance_domain::entities::NewLicenseConclusion;

use crate::{
    auth::AuthUser,
    error::ApiResult,
    extract::{parse_id, ValidatedJson, ValidatedQuery},
    models::{
        CountResponse, CreateLicenseConclusionRequest, ErrorResponse, LicenseConclusionDto,
        LicenseConclusionListResponse, LicenseConclusionQuery, LicenseConclusionResponse,
        MessageResponse, UpdateLicenseConclusionRequest,
    },
    state::{username_of, AppState},
};

/// List license conclusions
#[utoipa::path(
    get,
    path = "/license-conclusions",
    tag = "license-conclusions",
    security(("bearer" = [])),
    params(LicenseConclusionQuery),
    responses(
        (status = 200, description = "Matching license conclusions", body = LicenseConclusionListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_license_conclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<LicenseConclusionQuery>,
) -> ApiResult<Json<LicenseConclusionListResponse>> {
    let conclusions = state
        .repos
        .license_conclusions
        .list(&query.into_list()?)
        .await?;
    let usernames = state.usernames().await?;
    Ok(Json(LicenseConclusionListResponse {
        license_conclusions: conclusions
            .into_iter()
            .map(|c| {
                let username = username_of(&usernames, c.user_id);
                LicenseConclusionDto::new(c, username)
            })
            .collect(),
    }))
}

/// Count license conclusions
#[utoipa::path(
    get,
    path = "/license-conclusions/count",
    tag = "license-conclusions",
    security(("bearer" = [])),
    params(LicenseConclusionQuery),
    responses((status = 200, description = "Number of matches", body = CountResponse))
)]
pub async fn count_license_conclusions(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<LicenseConclusionQuery>,
) -> ApiResult<Json<CountResponse>> {
    let count = state
        .repos
        .license_conclusions
        .count(&query.filter())
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Create a license conclusion
#[utoipa::path(
    post,
    path = "/license-conclusions",
    tag = "license-conclusions",
    security(("bearer" = [])),
    request_body = CreateLicenseConclusionRequest,
    responses(
        (status = 201, description = "Conclusion created", body = LicenseConclusionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Unknown file", body = ErrorResponse)
    )
)]
pub async fn create_license_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateLicenseConclusionRequest>,
) -> ApiResult<(StatusCode, Json<LicenseConclusionResponse>)> {
    let conclusion = state
        .curation()
        .create_license_conclusion(NewLicenseConclusion {
            concluded_license_expression_spdx: request.concluded_license_expression_spdx,
            detected_license_expression_spdx: request.detected_license_expression_spdx,
            comment: request.comment,
            local: request.local.unwrap_or(false),
            context_purl: request.context_purl,
            file_sha256: request.file_sha256,
            user_id: auth.user.id,
            bulk_conclusion_id: None,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LicenseConclusionResponse {
            license_conclusion: LicenseConclusionDto::new(conclusion, auth.user.username),
        }),
    ))
}

/// Update a license conclusion
#[utoipa::path(
    put,
    path = "/license-conclusions/{id}",
    tag = "license-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "License conclusion id")),
    request_body = UpdateLicenseConclusionRequest,
    responses(
        (status = 200, description = "Conclusion updated", body = MessageResponse),
        (status = 400, description = "Invalid input or owned by a bulk conclusion", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown conclusion", body = ErrorResponse)
    )
)]
pub async fn update_license_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateLicenseConclusionRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let changes = request.into_changes()?;
    state
        .curation()
        .update_license_conclusion(&auth.actor(), id, &changes)
        .await?;
    Ok(Json(MessageResponse::new("License conclusion updated")))
}

/// Delete a license conclusion
#[utoipa::path(
    delete,
    path = "/license-conclusions/{id}",
    tag = "license-conclusions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "License conclusion id")),
    responses(
        (status = 200, description = "Conclusion deleted", body = MessageResponse),
        (status = 400, description = "Owned by a bulk conclusion", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown conclusion", body = ErrorResponse)
    )
)]
pub async fn delete_license_conclusion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    state
        .curation()
        .delete_license_conclusion(&auth.actor(), id)
        .await?;
    Ok(Json(MessageResponse::new("License conclusion deleted")))
}
