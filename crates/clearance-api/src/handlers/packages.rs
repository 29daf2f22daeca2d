//! Package, file tree and file endpoints
//!
//! `{purl}` and `{path}` are single percent-encoded path segments.

use axum::{
    extract::{Path, State},
    Json,
};

use clearance_domain::{entities::Package, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ValidatedQuery,
    models::{
        CountResponse, ErrorResponse, FileDto, FileResponse, FileTreeListResponse,
        LicenseConclusionDto, PackageListResponse, PackageQuery,
    },
    state::{username_of, AppState},
};

async fn package(state: &AppState, purl: &str) -> ApiResult<Package> {
    state
        .repos
        .resolve_package(purl)
        .await?
        .ok_or_else(|| DomainError::not_found("Package", purl).into())
}

#[utoipa::path(
    get,
    path = "/packages",
    tag = "packages",
    security(("bearer" = [])),
    params(PackageQuery),
    responses(
        (status = 200, description = "Matching packages", body = PackageListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_packages(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PackageQuery>,
) -> ApiResult<Json<PackageListResponse>> {
    let packages = state.repos.packages.list(&query.into_list()?).await?;
    Ok(Json(PackageListResponse {
        packages: packages.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/packages/count",
    tag = "packages",
    security(("bearer" = [])),
    params(PackageQuery),
    responses((status = 200, description = "Number of matches", body = CountResponse))
)]
pub async fn count_packages(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PackageQuery>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.repos.packages.count(&query.filter()).await?;
    Ok(Json(CountResponse { count }))
}

/// File tree of a package, ordered by path
#[utoipa::path(
    get,
    path = "/packages/{purl}/filetrees",
    tag = "packages",
    security(("bearer" = [])),
    params(("purl" = String, Path, description = "Percent-encoded purl")),
    responses(
        (status = 200, description = "File tree", body = FileTreeListResponse),
        (status = 404, description = "Unknown package", body = ErrorResponse)
    )
)]
pub async fn file_trees(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(purl): Path<String>,
) -> ApiResult<Json<FileTreeListResponse>> {
    let package = package(&state, &purl).await?;
    let tree = state.repos.file_trees.for_package(package.id).await?;
    Ok(Json(FileTreeListResponse {
        filetrees: tree.into_iter().map(Into::into).collect(),
    }))
}

/// Findings and conclusions of the file at a path of a package
#[utoipa::path(
    get,
    path = "/packages/{purl}/filetrees/{path}/files",
    tag = "packages",
    security(("bearer" = [])),
    params(
        ("purl" = String, Path, description = "Percent-encoded purl"),
        ("path" = String, Path, description = "Percent-encoded file path")
    ),
    responses(
        (status = 200, description = "File details", body = FileResponse),
        (status = 404, description = "Unknown package or path", body = ErrorResponse)
    )
)]
pub async fn file(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((purl, path)): Path<(String, String)>,
) -> ApiResult<Json<FileResponse>> {
    let package = package(&state, &purl).await?;
    let entry = state
        .repos
        .file_trees
        .find_by_path(package.id, &path)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No file at '{}' in {}", path, package.purl)))?;
    let file = state
        .repos
        .files
        .find(&entry.file_sha256)
        .await?
        .ok_or_else(|| DomainError::not_found("File", &entry.file_sha256))?;

    let contents = [entry.file_sha256.clone()];
    let license_findings = state.repos.files.license_findings(&contents).await?;
    let copyright_findings = state.repos.files.copyright_findings(&contents).await?;
    let conclusions = state.repos.license_conclusions.for_contents(&contents).await?;
    let usernames = state.usernames().await?;
    let conclusions = conclusions
        .into_iter()
        .map(|c| {
            let username = username_of(&usernames, c.user_id);
            LicenseConclusionDto::new(c, username)
        })
        .collect();

    Ok(Json(FileResponse {
        file: FileDto::new(file, license_findings, copyright_findings, conclusions),
    }))
}
