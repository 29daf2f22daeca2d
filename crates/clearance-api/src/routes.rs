//! API route definitions

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    error::ApiError,
    handlers::{
        admin, agent, auth, bulk_conclusions, health, license_conclusions, packages,
        path_exclusions, scanner,
    },
    middleware::logging_middleware,
    models,
    state::{AgentState, AppState},
};

/// Routes of the API service
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        // Authentication
        .route("/login/password", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/token", put(auth::create_token))
        .route("/user", get(auth::get_user).put(auth::change_password))
        // Administration
        .route(
            "/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route("/admin/users/{id}", axum::routing::delete(admin::delete_user))
        .route("/admin/purl-cleanup", post(admin::purl_cleanup))
        // Scanning
        .route(
            "/scan-results",
            post(scanner::scan_results).delete(scanner::delete_scan_results),
        )
        .route("/package-configuration", post(scanner::package_configuration))
        .route("/upload-url", post(scanner::upload_url))
        .route(
            "/uploads/{key}",
            put(scanner::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/job", post(scanner::create_job))
        .route(
            "/job-state/{id}",
            get(scanner::job_state).put(scanner::update_job_state),
        )
        .route("/job-results", post(scanner::job_results))
        // Curation
        .route(
            "/license-conclusions",
            get(license_conclusions::list_license_conclusions)
                .post(license_conclusions::create_license_conclusion),
        )
        .route(
            "/license-conclusions/count",
            get(license_conclusions::count_license_conclusions),
        )
        .route(
            "/license-conclusions/{id}",
            put(license_conclusions::update_license_conclusion)
                .delete(license_conclusions::delete_license_conclusion),
        )
        .route(
            "/bulk-conclusions",
            get(bulk_conclusions::list_bulk_conclusions)
                .post(bulk_conclusions::create_bulk_conclusion),
        )
        .route(
            "/bulk-conclusions/count",
            get(bulk_conclusions::count_bulk_conclusions),
        )
        .route("/bulk-conclusions/preview", post(bulk_conclusions::preview))
        .route(
            "/bulk-conclusions/{id}",
            get(bulk_conclusions::get_bulk_conclusion)
                .put(bulk_conclusions::update_bulk_conclusion)
                .delete(bulk_conclusions::delete_bulk_conclusion),
        )
        .route(
            "/bulk-conclusions/{id}/affected-files",
            get(bulk_conclusions::affected_files),
        )
        .route(
            "/path-exclusions",
            get(path_exclusions::list_path_exclusions)
                .post(path_exclusions::create_path_exclusion),
        )
        .route(
            "/path-exclusions/count",
            get(path_exclusions::count_path_exclusions),
        )
        .route(
            "/path-exclusions/{id}",
            put(path_exclusions::update_path_exclusion)
                .delete(path_exclusions::delete_path_exclusion),
        )
        // Packages
        .route("/packages", get(packages::list_packages))
        .route("/packages/count", get(packages::count_packages))
        .route("/packages/{purl}/filetrees", get(packages::file_trees))
        .route("/packages/{purl}/filetrees/{path}/files", get(packages::file))
}

#[cfg(feature = "swagger-ui")]
fn doc_routes() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn doc_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(not(feature = "swagger-ui"))]
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// The complete API application
pub fn api_router(state: AppState) -> Router {
    api_routes()
        .merge(doc_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The standalone scanner-agent application
pub fn agent_router(state: AgentState) -> Router {
    Router::new()
        .route("/health", get(agent_health))
        .route("/job", post(agent::add_job))
        .route("/job/{id}", get(agent::job_status))
        .route("/result-state/{id}", post(agent::result_state))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn agent_health() -> Json<models::MessageResponse> {
    Json(models::MessageResponse::new("ok"))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "scanner_agent",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::create_token,
        auth::get_user,
        auth::change_password,
        admin::create_user,
        admin::list_users,
        admin::delete_user,
        admin::purl_cleanup,
        scanner::scan_results,
        scanner::delete_scan_results,
        scanner::package_configuration,
        scanner::upload_url,
        scanner::upload,
        scanner::create_job,
        scanner::job_state,
        scanner::update_job_state,
        scanner::job_results,
        license_conclusions::list_license_conclusions,
        license_conclusions::count_license_conclusions,
        license_conclusions::create_license_conclusion,
        license_conclusions::update_license_conclusion,
        license_conclusions::delete_license_conclusion,
        bulk_conclusions::list_bulk_conclusions,
        bulk_conclusions::count_bulk_conclusions,
        bulk_conclusions::get_bulk_conclusion,
        bulk_conclusions::affected_files,
        bulk_conclusions::preview,
        bulk_conclusions::create_bulk_conclusion,
        bulk_conclusions::update_bulk_conclusion,
        bulk_conclusions::delete_bulk_conclusion,
        path_exclusions::list_path_exclusions,
        path_exclusions::count_path_exclusions,
        path_exclusions::create_path_exclusion,
        path_exclusions::update_path_exclusion,
        path_exclusions::delete_path_exclusion,
        packages::list_packages,
        packages::count_packages,
        packages::file_trees,
        packages::file,
    ),
    components(schemas(
        models::ErrorResponse,
        models::MessageResponse,
        models::CountResponse,
        models::HealthResponse,
        models::UserRef,
        models::LoginRequest,
        models::LoginResponse,
        models::TokenResponse,
        models::UserResponse,
        models::ChangePasswordRequest,
        models::CreateUserRequest,
        models::CreatedUserResponse,
        models::UserSummary,
        models::UserListResponse,
        models::PurlCleanupRequest,
        models::BookmarkEntry,
        models::PurlCleanupResults,
        models::PurlCleanupResponse,
        models::PurlRequest,
        models::PurlsRequest,
        models::ScanResultsState,
        models::ScanResultsResponse,
        models::ConfiguredConclusionDto,
        models::ConfiguredExclusionDto,
        models::PackageConfigurationResponse,
        models::UploadUrlRequest,
        models::UploadUrlResponse,
        models::CreateJobRequest,
        models::CreateJobResponse,
        models::JobStateDto,
        models::JobStateResponse,
        models::JobStateReport,
        models::JobStateReportData,
        models::UpdateJobStateRequest,
        models::JobResultsRequest,
        models::LicenseConclusionDto,
        models::LicenseConclusionListResponse,
        models::LicenseConclusionResponse,
        models::CreateLicenseConclusionRequest,
        models::UpdateLicenseConclusionRequest,
        models::BulkConclusionDto,
        models::BulkConclusionListResponse,
        models::BulkConclusionResponse,
        models::AdditionalMatchDto,
        models::AffectedFilesDto,
        models::AffectedFilesResponse,
        models::PreviewRequest,
        models::PreviewResponse,
        models::CreateBulkConclusionRequest,
        models::BulkCreatedResponse,
        models::UpdateBulkConclusionRequest,
        models::BulkUpdatedResponse,
        models::PathExclusionDto,
        models::PathExclusionListResponse,
        models::PathExclusionResponse,
        models::CreatePathExclusionRequest,
        models::UpdatePathExclusionRequest,
        models::PackageDto,
        models::PackageListResponse,
        models::FileTreeDto,
        models::FileTreeListResponse,
        models::LicenseFindingDto,
        models::CopyrightFindingDto,
        models::FileDto,
        models::FileResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Login, tokens and the current user"),
        (name = "admin", description = "User management and purl cleanup"),
        (name = "scanner", description = "Uploads, scanner jobs and scan results"),
        (name = "license-conclusions", description = "Per-file license decisions"),
        (name = "bulk-conclusions", description = "Pattern-based license decisions"),
        (name = "path-exclusions", description = "Paths left out of results"),
        (name = "packages", description = "Scanned packages and their files")
    ),
    info(
        title = "Clearance API",
        description = "License clearance of open-source packages: scanning, results and curation"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/scan-results"));
        assert!(doc.paths.paths.contains_key("/packages/{purl}/filetrees/{path}/files"));
        let schemes = doc.components.unwrap().security_schemes;
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("scanner_agent"));
    }
}
