//! Authentication, user and administration contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clearance_domain::{
    entities::{Role, User},
    services::{CleanupBookmark, CleanupReport},
};

use crate::extract::non_null;

/// Username and password login
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub username: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
    /// Session token for the `Authorization: Bearer` header
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// The authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    /// Generated when omitted
    #[serde(default, deserialize_with = "non_null")]
    pub password: Option<String>,
    /// Defaults to `USER`
    #[serde(default, deserialize_with = "non_null")]
    #[schema(value_type = Option<String>, example = "USER")]
    pub role: Option<Role>,
}

/// A created user with its initial credentials
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedUserResponse {
    pub id: i64,
    pub username: String,
    pub password: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
    /// API token of the new user
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurlCleanupRequest {
    /// Report what would change without changing anything (default `true`)
    #[serde(default, deserialize_with = "non_null")]
    pub dry_run: Option<bool>,
    /// Only clean packages of this type
    #[serde(default, deserialize_with = "non_null")]
    pub pkg_type: Option<String>,
    /// Only clean the group of this purl
    #[serde(default, deserialize_with = "non_null")]
    pub purl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkEntry {
    pub purl: String,
    pub bookmark_of: String,
}

impl From<CleanupBookmark> for BookmarkEntry {
    fn from(bookmark: CleanupBookmark) -> Self {
        Self {
            purl: bookmark.purl,
            bookmark_of: bookmark.bookmark_of,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurlCleanupResults {
    pub deleted_packages: Vec<String>,
    pub bookmarks: Vec<BookmarkEntry>,
    pub moved_license_conclusions: u64,
    pub moved_bulk_conclusions: u64,
    pub moved_path_exclusions: u64,
}

impl From<CleanupReport> for PurlCleanupResults {
    fn from(report: CleanupReport) -> Self {
        Self {
            deleted_packages: report.deleted_packages,
            bookmarks: report.bookmarks.into_iter().map(Into::into).collect(),
            moved_license_conclusions: report.moved_license_conclusions,
            moved_bulk_conclusions: report.moved_bulk_conclusions,
            moved_path_exclusions: report.moved_path_exclusions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurlCleanupResponse {
    pub message: String,
    pub results: PurlCleanupResults,
}
