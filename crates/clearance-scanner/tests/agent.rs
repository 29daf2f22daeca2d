use std::{fs, path::Path, sync::Arc, time::Duration};

use clearance_domain::{
    entities::{JobStatus, ScanStatus},
    services::JobService,
    Repositories,
};
use clearance_persistence::InMemoryStore;
use clearance_scanner::{
    protocol::{AgentJobState, AgentJobStatus},
    AgentClient, ClientConfig, EmbeddedDispatcher, EmbeddedReporter, HttpDispatcher,
    HttpReporter, JobQueue, JobReporter, QueueConfig, ScanDispatcher, ScanWorker, ScannerError,
};
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn write_sources(root: &Path) {
    fs::create_dir_all(root.join("lib")).unwrap();
    fs::write(
        root.join("LICENSE"),
        "Copyright (c) 2020 Example Corp\n\nPermission is hereby granted, free of charge, to any person\n",
    )
    .unwrap();
    fs::write(
        root.join("lib/main.c"),
        "/* SPDX-License-Identifier: Apache-2.0 */\nint main(void) { return 0; }\n",
    )
    .unwrap();
}

async fn wait_for_status(jobs: &JobService, id: &str, wanted: JobStatus) {
    for _ in 0..400 {
        if jobs.get(id).await.unwrap().status == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached {}", id, wanted);
}

#[tokio::test]
async fn test_embedded_agent_scans_and_saves() {
    let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
    let jobs = JobService::new(repos.clone());
    let job = jobs
        .create("pkg.tgz", &["pkg:generic/example@1.0".to_string()])
        .await
        .unwrap();
    jobs.transition(&job.id, JobStatus::Processing, None).await.unwrap();
    jobs.transition(&job.id, JobStatus::Queued, None).await.unwrap();

    let work = tempfile::tempdir().unwrap();
    let directory = work.path().join(&job.id);
    write_sources(&directory);

    let reporter: Arc<dyn JobReporter> = Arc::new(EmbeddedReporter::new(repos.clone()));
    let queue = JobQueue::start(QueueConfig::default(), Arc::new(ScanWorker::new(reporter)));
    let dispatcher = EmbeddedDispatcher::new(queue.clone());
    let agent_job_id = dispatcher.dispatch(&directory, &job.id).await.unwrap();

    wait_for_status(&jobs, &job.id, JobStatus::Completed).await;

    let package = repos
        .packages
        .find_by_purl("pkg:generic/example@1.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.scan_status, ScanStatus::Scanned);
    let tree = repos.file_trees.for_package(package.id).await.unwrap();
    let paths: Vec<&str> = tree.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["LICENSE", "lib/main.c"]);

    let shas: Vec<String> = tree.iter().map(|e| e.file_sha256.clone()).collect();
    let mut licenses: Vec<String> = repos
        .files
        .license_findings(&shas)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.license_expression_spdx)
        .collect();
    licenses.sort();
    assert_eq!(licenses, vec!["Apache-2.0", "MIT"]);
    assert_eq!(repos.files.copyright_findings(&shas).await.unwrap().len(), 1);

    // the worker removes the scanned directory
    for _ in 0..200 {
        if dispatcher.status(&agent_job_id).await.unwrap().state == AgentJobState::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!directory.exists());
    dispatcher.acknowledge(&agent_job_id).await.unwrap();
    assert!(matches!(
        dispatcher.status(&agent_job_id).await,
        Err(ScannerError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_embedded_agent_fails_missing_directory() {
    let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
    let jobs = JobService::new(repos.clone());
    let job = jobs
        .create("pkg.tgz", &["pkg:generic/missing@1".to_string()])
        .await
        .unwrap();
    jobs.transition(&job.id, JobStatus::Processing, None).await.unwrap();
    jobs.transition(&job.id, JobStatus::Queued, None).await.unwrap();

    let reporter: Arc<dyn JobReporter> = Arc::new(EmbeddedReporter::new(repos.clone()));
    let worker = ScanWorker::new(reporter).keep_directories();
    let queue = JobQueue::start(QueueConfig::default(), Arc::new(worker));
    let work = tempfile::tempdir().unwrap();
    queue.add(work.path().join("nothing-here"), &job.id).unwrap();

    wait_for_status(&jobs, &job.id, JobStatus::Failed).await;
    let package = repos
        .packages
        .find_by_purl("pkg:generic/missing@1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.scan_status, ScanStatus::Failed);
    assert!(jobs.get(&job.id).await.unwrap().message.is_some());
}

#[tokio::test]
async fn test_http_reporter_calls_api_routes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/job-state/j1"))
        .and(header("authorization", "Bearer agent-token"))
        .and(body_partial_json(serde_json::json!({"data": {"state": {"status": "scanning"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/job-results"))
        .and(body_partial_json(serde_json::json!({"id": "j1", "agentJobId": "agent-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AgentClient::new(&server.uri(), "agent-token", ClientConfig::fast()).unwrap();
    let reporter = HttpReporter::new(Arc::new(client));
    reporter
        .report_state("j1", JobStatus::Scanning, None)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let report = clearance_scanner::scan::scan_directory(dir.path()).unwrap();
    reporter
        .report_results("j1", "agent-1", report)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_reporter_surfaces_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"message": "illegal transition"})),
        )
        .mount(&server)
        .await;

    let client = AgentClient::new(&server.uri(), "t", ClientConfig::fast()).unwrap();
    let result = HttpReporter::new(Arc::new(client))
        .report_state("j1", JobStatus::Completed, None)
        .await;
    assert!(matches!(result, Err(ScannerError::HttpStatus { .. })));
}

#[tokio::test]
async fn test_http_dispatcher_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/job"))
        .and(body_partial_json(serde_json::json!({"opts": {"jobId": "api-7"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "agent-1",
            "name": "scan",
            "data": {"directory": "/work/api-7"},
            "opts": {"jobId": "api-7"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/agent-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "agent-1",
            "state": "completed",
            "finishedOn": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "not found"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/result-state/agent-1"))
        .and(body_partial_json(serde_json::json!({"state": "saved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AgentClient::new(&server.uri(), "t", ClientConfig::fast()).unwrap();
    let dispatcher = HttpDispatcher::new(Arc::new(client));

    let id = dispatcher
        .dispatch(Path::new("/work/api-7"), "api-7")
        .await
        .unwrap();
    assert_eq!(id, "agent-1");

    let status: AgentJobStatus = dispatcher.status("agent-1").await.unwrap();
    assert_eq!(status.state, AgentJobState::Completed);
    assert!(status.finished_on.is_some());

    assert!(matches!(
        dispatcher.status("unknown").await,
        Err(ScannerError::JobNotFound(_))
    ));
    dispatcher.acknowledge("agent-1").await.unwrap();
}
