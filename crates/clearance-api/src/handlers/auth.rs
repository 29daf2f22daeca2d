//! Login, logout, tokens and the current user

use axum::{extract::State, Json};
use tracing::info;

use clearance_domain::entities::TokenKind;

use crate::{
    auth::{check_password_length, hash_password, issue_token, verify_password, AuthUser},
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    models::{
        ChangePasswordRequest, ErrorResponse, LoginRequest, LoginResponse, MessageResponse,
        TokenResponse, UserResponse,
    },
    state::AppState,
};

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/login/password",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created", body = LoginResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Wrong credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let wrong = || ApiError::Forbidden("Invalid username or password".to_string());
    let user = state
        .repos
        .users
        .find_by_username(&request.username)
        .await?
        .ok_or_else(wrong)?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(wrong());
    }

    let token = issue_token(&state, user.id, TokenKind::Session).await?;
    info!(user_id = user.id, "User logged in");
    Ok(Json(LoginResponse {
        username: user.username,
        role: user.role,
        token,
    }))
}

/// Revoke the token used for this request
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    state.repos.tokens.revoke(&auth.token_hash).await?;
    info!(user_id = auth.user.id, "User logged out");
    Ok(Json(MessageResponse::new("Logged out")))
}

/// Create a new API token, revoking the previous ones
#[utoipa::path(
    put,
    path = "/token",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New API token", body = TokenResponse),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
pub async fn create_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<TokenResponse>> {
    let revoked = state
        .repos
        .tokens
        .revoke_for_user(auth.user.id, Some(TokenKind::Api))
        .await?;
    let token = issue_token(&state, auth.user.id, TokenKind::Api).await?;
    info!(user_id = auth.user.id, revoked, "Issued API token");
    Ok(Json(TokenResponse { token }))
}

/// The authenticated user
#[utoipa::path(
    get,
    path = "/user",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing token", body = ErrorResponse)
    )
)]
pub async fn get_user(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        id: auth.user.id,
        username: auth.user.username,
        role: auth.user.role,
    })
}

/// Change the authenticated user's password
#[utoipa::path(
    put,
    path = "/user",
    tag = "auth",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Password too short", body = ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_password_length(&request.password, state.config.auth.min_password_length)?;
    let hash = hash_password(&request.password)?;
    state
        .repos
        .users
        .set_password_hash(auth.user.id, &hash)
        .await?;
    info!(user_id = auth.user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password changed")))
}
