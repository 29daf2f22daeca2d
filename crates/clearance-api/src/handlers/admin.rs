//! User administration and purl cleanup

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use clearance_domain::{
    entities::{NewUser, Role, TokenKind},
    services::CleanupOptions,
    value_objects::validate_username,
};

use crate::{
    auth::{check_password_length, generate_password, hash_password, issue_token, AdminUser},
    error::{ApiError, ApiResult},
    extract::{parse_id, ValidatedJson},
    models::{
        CreateUserRequest, CreatedUserResponse, ErrorResponse, MessageResponse,
        PurlCleanupRequest, PurlCleanupResponse, UserListResponse,
    },
    state::AppState,
};

/// Create a user
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "admin",
    security(("bearer" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUserResponse),
        (status = 400, description = "Invalid or taken username", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUserResponse>)> {
    validate_username(&request.username)?;
    let password = match request.password {
        Some(password) => {
            check_password_length(&password, state.config.auth.min_password_length)?;
            password
        }
        None => generate_password(),
    };
    let role = request.role.unwrap_or(Role::User);

    let user = state
        .repos
        .users
        .create(NewUser {
            username: request.username,
            password_hash: hash_password(&password)?,
            role,
        })
        .await?;
    let token = issue_token(&state, user.id, TokenKind::Api).await?;
    info!(user_id = user.id, role = %role, created_by = admin.user.id, "Created user");

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            id: user.id,
            username: user.username,
            password,
            role,
            token,
        }),
    ))
}

/// List users
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<UserListResponse>> {
    let users = state.repos.users.list().await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// Delete a user and revoke its tokens
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Deleting yourself", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    if id == admin.user.id {
        return Err(ApiError::bad_request("You cannot delete your own user"));
    }
    if state.repos.users.find_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }
    state.repos.tokens.revoke_for_user(id, None).await?;
    state.repos.users.delete(id).await?;
    info!(user_id = id, deleted_by = admin.user.id, "Deleted user");
    Ok(Json(MessageResponse::new("User deleted")))
}

/// Merge packages whose purls differ only in qualifiers
#[utoipa::path(
    post,
    path = "/admin/purl-cleanup",
    tag = "admin",
    security(("bearer" = [])),
    request_body = PurlCleanupRequest,
    responses(
        (status = 200, description = "Cleanup report", body = PurlCleanupResponse),
        (status = 400, description = "Invalid purl", body = ErrorResponse)
    )
)]
pub async fn purl_cleanup(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<PurlCleanupRequest>,
) -> ApiResult<Json<PurlCleanupResponse>> {
    let options = CleanupOptions {
        dry_run: request.dry_run.unwrap_or(true),
        pkg_type: request.pkg_type,
        purl: request.purl,
    };
    let report = state.cleanup().run(&options).await?;
    let message = if options.dry_run {
        "Dry run: nothing was changed"
    } else {
        "Purl cleanup finished"
    };
    Ok(Json(PurlCleanupResponse {
        message: message.to_string(),
        results: report.into(),
    }))
}
