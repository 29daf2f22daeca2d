//! Domain services running against the in-memory store

use std::sync::Arc;

use chrono::Utc;
use clearance_domain::{
    entities::{
        Actor, BulkConclusionChanges, DetectedLicense, JobStatus, LicenseConclusionChanges,
        NewBulkConclusion, NewLicenseConclusion, NewPathExclusion, NewUser, PathExclusionReason,
        Role, ScanReport, ScanStatus, ScannedFile, ScannerInfo,
    },
    query::{LicenseConclusionFilter, ListQuery},
    services::{
        BulkConclusionService, CleanupOptions, CurationService, JobService, PurlCleanup,
        ResultAggregator, ResultStatus, ScanIngestor,
    },
    DomainError, Repositories,
};
use clearance_persistence::InMemoryStore;

fn sha(c: char) -> String {
    assert!(c.is_ascii_hexdigit(), "digest fixture must be hex: {c}");
    c.to_string().repeat(64)
}

fn file(path: &str, c: char, licenses: &[&str]) -> ScannedFile {
    ScannedFile {
        path: path.to_string(),
        sha256: Some(sha(c)),
        license_findings: licenses
            .iter()
            .map(|l| DetectedLicense {
                license_expression_spdx: l.to_string(),
                start_line: 1,
                end_line: 3,
                score: 100.0,
            })
            .collect(),
        copyright_findings: Vec::new(),
    }
}

fn report(files: Vec<ScannedFile>) -> ScanReport {
    ScanReport {
        scanner: ScannerInfo {
            name: "clearance-scanner".to_string(),
            version: "0.1.0".to_string(),
        },
        started_at: Utc::now(),
        finished_at: Utc::now(),
        files,
        issues: Vec::new(),
    }
}

struct Fixture {
    repos: Repositories,
    alice: Actor,
    bob: Actor,
    admin: Actor,
}

async fn fixture() -> Fixture {
    let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
    let mut actors = Vec::new();
    for (name, role) in [("alice", Role::User), ("bob", Role::User), ("root", Role::Admin)] {
        let user = repos
            .users
            .create(NewUser {
                username: name.to_string(),
                password_hash: "x".to_string(),
                role,
            })
            .await
            .unwrap();
        actors.push(Actor::new(user.id, role));
    }
    Fixture {
        repos,
        alice: actors[0],
        bob: actors[1],
        admin: actors[2],
    }
}

/// Run a job for `purl` through to completed with `files`
async fn scan(repos: &Repositories, purl: &str, files: Vec<ScannedFile>) {
    let jobs = JobService::new(repos.clone());
    let job = jobs.create("upload.tar.gz", &[purl.to_string()]).await.unwrap();
    jobs.transition(&job.id, JobStatus::Processing, None).await.unwrap();
    jobs.transition(&job.id, JobStatus::Queued, None).await.unwrap();
    jobs.transition(&job.id, JobStatus::Scanning, None).await.unwrap();
    ScanIngestor::new(repos.clone())
        .save_results(&job.id, &report(files))
        .await
        .unwrap();
}

fn bulk(pattern: &str, context: &str, actor: &Actor, local: bool) -> NewBulkConclusion {
    NewBulkConclusion {
        pattern: pattern.to_string(),
        concluded_license_expression_spdx: "MIT".to_string(),
        detected_license_expression_spdx: None,
        comment: Some("bulk".to_string()),
        local,
        context_purl: context.to_string(),
        user_id: actor.user_id,
    }
}

#[tokio::test]
async fn test_ingestion_marks_everything_scanned() {
    let f = fixture().await;
    scan(&f.repos, "pkg:npm/a@1", vec![file("LICENSE", 'a', &["MIT"])]).await;

    let package = f.repos.packages.find_by_purl("pkg:npm/a@1").await.unwrap().unwrap();
    assert_eq!(package.scan_status, ScanStatus::Scanned);
    let tree = f.repos.file_trees.for_package(package.id).await.unwrap();
    assert_eq!(tree.len(), 1);
    let findings = f.repos.files.license_findings(&[sha('a')]).await.unwrap();
    assert_eq!(findings[0].scanner, "clearance-scanner@0.1.0");
}

#[tokio::test]
async fn test_bulk_create_requires_a_match() {
    let f = fixture().await;
    scan(&f.repos, "pkg:npm/a@1", vec![file("src/a.js", 'a', &[])]).await;
    let service = BulkConclusionService::new(f.repos.clone());

    let err = service
        .create(bulk("**/*.py", "pkg:npm/a@1", &f.alice, false))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationError { ref field, .. } if field == "pattern"));
}

#[tokio::test]
async fn test_bulk_lifecycle() {
    let f = fixture().await;
    scan(
        &f.repos,
        "pkg:npm/a@1",
        vec![
            file("src/a.js", 'a', &[]),
            file("src/copy.js", 'a', &[]),
            file("src/b.js", 'b', &[]),
            file("test/c.js", 'c', &[]),
        ],
    )
    .await;
    let service = BulkConclusionService::new(f.repos.clone());

    let created = service
        .create(bulk("src/*.js", "pkg:npm/a@1", &f.alice, false))
        .await
        .unwrap();
    assert_eq!(created.matched_paths_count, 3);
    assert_eq!(created.added_license_conclusions_count, 2);

    let err = service
        .update(&f.bob, created.bulk_conclusion_id, BulkConclusionChanges::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied { .. }));

    let updated = service
        .update(
            &f.alice,
            created.bulk_conclusion_id,
            BulkConclusionChanges {
                pattern: Some("**/c.js".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.matched_paths_count, 1);
    assert_eq!(updated.added_license_conclusions_count, 1);
    assert_eq!(updated.deleted_license_conclusions_count, 2);

    assert_eq!(service.delete(&f.admin, created.bulk_conclusion_id).await.unwrap(), 1);
    let remaining = f
        .repos
        .license_conclusions
        .count(&LicenseConclusionFilter::default())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_affected_files_reach_other_packages() {
    let f = fixture().await;
    scan(&f.repos, "pkg:npm/a@1", vec![file("lib/x.js", 'e', &[])]).await;
    scan(&f.repos, "pkg:npm/other@2", vec![file("vendor/x.js", 'e', &[])]).await;
    let service = BulkConclusionService::new(f.repos.clone());

    let id = service
        .create(bulk("lib/**", "pkg:npm/a@1", &f.alice, true))
        .await
        .unwrap()
        .bulk_conclusion_id;
    let affected = service.affected_files(id).await.unwrap();
    assert_eq!(affected.in_context_purl, vec!["lib/x.js".to_string()]);
    assert_eq!(affected.additional_matches.len(), 1);
    assert_eq!(affected.additional_matches[0].purl, "pkg:npm/other@2");
    assert_eq!(affected.additional_matches[0].path, "vendor/x.js");
}

#[tokio::test]
async fn test_non_local_bulk_propagates_to_new_versions() {
    let f = fixture().await;
    scan(&f.repos, "pkg:npm/a@1", vec![file("dist/a.js", 'a', &[])]).await;
    let service = BulkConclusionService::new(f.repos.clone());
    service
        .create(bulk("dist/**", "pkg:npm/a@1", &f.alice, false))
        .await
        .unwrap();
    service
        .create(bulk("dist/**", "pkg:npm/a@1", &f.alice, true))
        .await
        .unwrap();

    scan(&f.repos, "pkg:npm/a@2", vec![file("dist/a.js", 'd', &[])]).await;

    let on_new = f.repos.license_conclusions.for_contents(&[sha('d')]).await.unwrap();
    assert_eq!(on_new.len(), 1);
    assert!(!on_new[0].local);
}

#[tokio::test]
async fn test_package_configuration_resolution() {
    let f = fixture().await;
    scan(
        &f.repos,
        "pkg:npm/a@1",
        vec![
            file("LICENSE", 'f', &["MIT", "ISC OR MIT"]),
            file("src/index.js", '9', &[]),
        ],
    )
    .await;
    let curation = CurationService::new(f.repos.clone());
    let conclusion = |concluded: &str, context: &str, local: bool| NewLicenseConclusion {
        concluded_license_expression_spdx: concluded.to_string(),
        detected_license_expression_spdx: None,
        comment: None,
        local,
        context_purl: context.to_string(),
        file_sha256: sha('f'),
        user_id: f.alice.user_id,
        bulk_conclusion_id: None,
    };

    curation
        .create_license_conclusion(conclusion("Apache-2.0", "pkg:npm/elsewhere@1", true))
        .await
        .unwrap();
    curation
        .create_license_conclusion(conclusion("BSD-3-Clause", "pkg:npm/elsewhere@2", false))
        .await
        .unwrap();
    curation
        .create_path_exclusion(NewPathExclusion {
            purl: "pkg:npm/a@1".to_string(),
            pattern: "test/**".to_string(),
            reason: PathExclusionReason::TestOf,
            comment: None,
            user_id: f.alice.user_id,
        })
        .await
        .unwrap();

    let aggregator = ResultAggregator::new(f.repos.clone());
    let config = aggregator.package_configuration("pkg:npm/a@1").await.unwrap();
    assert_eq!(config.license_conclusions.len(), 1);
    let entry = &config.license_conclusions[0];
    assert_eq!(entry.path, "LICENSE");
    assert_eq!(entry.concluded_license_expression_spdx, "BSD-3-Clause");
    assert_eq!(
        entry.detected_license_expression_spdx.as_deref(),
        Some("MIT AND (ISC OR MIT)")
    );
    assert_eq!(config.path_exclusions.len(), 1);

    curation
        .create_license_conclusion(conclusion("0BSD", "pkg:npm/a@1", true))
        .await
        .unwrap();
    let config = aggregator.package_configuration("pkg:npm/a@1").await.unwrap();
    assert_eq!(config.license_conclusions[0].concluded_license_expression_spdx, "0BSD");

    let unknown = aggregator.package_configuration("pkg:npm/lodash@4.17.21").await.unwrap();
    assert!(unknown.license_conclusions.is_empty());
    assert!(unknown.path_exclusions.is_empty());
}

#[tokio::test]
async fn test_bulk_owned_conclusions_are_read_only() {
    let f = fixture().await;
    scan(&f.repos, "pkg:npm/a@1", vec![file("a.c", 'a', &[])]).await;
    BulkConclusionService::new(f.repos.clone())
        .create(bulk("*.c", "pkg:npm/a@1", &f.alice, false))
        .await
        .unwrap();
    let owned = f
        .repos
        .license_conclusions
        .list(&ListQuery::all())
        .await
        .unwrap()
        .remove(0);

    let curation = CurationService::new(f.repos.clone());
    let err = curation
        .update_license_conclusion(
            &f.alice,
            owned.id,
            &LicenseConclusionChanges {
                comment: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::BusinessRuleViolation { .. }));
    assert!(curation.delete_license_conclusion(&f.admin, owned.id).await.is_err());
}

#[tokio::test]
async fn test_scan_results_states() {
    let f = fixture().await;
    let aggregator = ResultAggregator::new(f.repos.clone());

    let none = aggregator
        .scan_results(&["pkg:npm/a@1".to_string()])
        .await
        .unwrap();
    assert_eq!(none.status, ResultStatus::NoResults);
    assert!(none.job_id.is_none());

    let job = JobService::new(f.repos.clone())
        .create("a.tgz", &["pkg:npm/a@1".to_string()])
        .await
        .unwrap();
    let pending = aggregator
        .scan_results(&["pkg:npm/a@1".to_string()])
        .await
        .unwrap();
    assert_eq!(pending.status, ResultStatus::Pending);
    assert_eq!(pending.job_id.as_deref(), Some(job.id.as_str()));

    scan(&f.repos, "pkg:npm/b@1", vec![file("COPYING", 'c', &["GPL-2.0-only"])]).await;
    let ready = aggregator
        .scan_results(&["pkg:npm/b@1".to_string()])
        .await
        .unwrap();
    assert_eq!(ready.status, ResultStatus::Ready);
    let results = ready.results.unwrap();
    assert_eq!(results.licenses[0].license, "GPL-2.0-only");
    assert_eq!(results.licenses[0].location.path, "COPYING");
}

#[tokio::test]
async fn test_failed_job_fails_packages() {
    let f = fixture().await;
    let jobs = JobService::new(f.repos.clone());
    let job = jobs.create("a.tgz", &["pkg:npm/a@1".to_string()]).await.unwrap();
    ScanIngestor::new(f.repos.clone())
        .mark_failed(&job.id, "archive corrupt")
        .await
        .unwrap();

    let package = f.repos.packages.find_by_purl("pkg:npm/a@1").await.unwrap().unwrap();
    assert_eq!(package.scan_status, ScanStatus::Failed);
    let job = jobs.get(&job.id).await.unwrap();
    assert_eq!(job.message.as_deref(), Some("archive corrupt"));
}

#[tokio::test]
async fn test_purl_cleanup_merges_qualifier_variants() {
    let f = fixture().await;
    let failed = JobService::new(f.repos.clone())
        .create("x64.tgz", &["pkg:npm/a@1?arch=x64".to_string()])
        .await
        .unwrap();
    ScanIngestor::new(f.repos.clone())
        .mark_failed(&failed.id, "unpack failed")
        .await
        .unwrap();
    scan(&f.repos, "pkg:npm/a@1?arch=arm", vec![file("a.js", 'a', &[])]).await;
    CurationService::new(f.repos.clone())
        .create_path_exclusion(NewPathExclusion {
            purl: "pkg:npm/a@1?arch=x64".to_string(),
            pattern: "docs/**".to_string(),
            reason: PathExclusionReason::DocumentationOf,
            comment: None,
            user_id: f.alice.user_id,
        })
        .await
        .unwrap();

    let cleanup = PurlCleanup::new(f.repos.clone());
    let plan = cleanup.run(&CleanupOptions::default()).await.unwrap();
    assert_eq!(plan.deleted_packages, vec!["pkg:npm/a@1?arch=x64".to_string()]);
    assert_eq!(plan.moved_path_exclusions, 1);
    assert_eq!(f.repos.packages.find_all().await.unwrap().len(), 2);

    let done = cleanup
        .run(&CleanupOptions {
            dry_run: false,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(done.bookmarks[0].bookmark_of, "pkg:npm/a@1?arch=arm");
    assert_eq!(f.repos.packages.find_all().await.unwrap().len(), 1);

    let resolved = f
        .repos
        .resolve_package("pkg:npm/a@1?arch=x64")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.purl, "pkg:npm/a@1?arch=arm");
    let exclusions = f.repos.path_exclusions.for_purl("pkg:npm/a@1?arch=arm").await.unwrap();
    assert_eq!(exclusions.len(), 1);
}

#[tokio::test]
async fn test_purl_cleanup_refuses_before_merging_anything() {
    let f = fixture().await;
    let jobs = JobService::new(f.repos.clone());
    let failed = jobs
        .create("x64.tgz", &["pkg:npm/a@1?arch=x64".to_string()])
        .await
        .unwrap();
    ScanIngestor::new(f.repos.clone())
        .mark_failed(&failed.id, "unpack failed")
        .await
        .unwrap();
    scan(&f.repos, "pkg:npm/a@1?arch=arm", vec![file("a.js", 'a', &[])]).await;
    CurationService::new(f.repos.clone())
        .create_path_exclusion(NewPathExclusion {
            purl: "pkg:npm/a@1?arch=x64".to_string(),
            pattern: "docs/**".to_string(),
            reason: PathExclusionReason::DocumentationOf,
            comment: None,
            user_id: f.alice.user_id,
        })
        .await
        .unwrap();

    // Second group: the variant to be merged away is still being scanned
    scan(&f.repos, "pkg:npm/b@1?arch=arm", vec![file("b.js", 'b', &[])]).await;
    jobs.create("b-x64.tgz", &["pkg:npm/b@1?arch=x64".to_string()])
        .await
        .unwrap();

    let err = PurlCleanup::new(f.repos.clone())
        .run(&CleanupOptions {
            dry_run: false,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::BusinessRuleViolation { .. }));

    assert_eq!(f.repos.packages.find_all().await.unwrap().len(), 4);
    assert!(f
        .repos
        .packages
        .find_by_purl("pkg:npm/a@1?arch=x64")
        .await
        .unwrap()
        .is_some());
    let exclusions = f.repos.path_exclusions.for_purl("pkg:npm/a@1?arch=x64").await.unwrap();
    assert_eq!(exclusions.len(), 1);
    let moved = f.repos.path_exclusions.for_purl("pkg:npm/a@1?arch=arm").await.unwrap();
    assert!(moved.is_empty());
}
