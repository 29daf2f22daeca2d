//! Test support for the end-to-end suites under `tests/`
//!
//! [`TestServer`] runs the full API router in-process with the embedded
//! scanner agent, backed by a fresh in-memory store and a temporary
//! storage directory.

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use flate2::{write::GzEncoder, Compression};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use clearance_api::{
    api_router,
    auth::{hash_password, issue_token},
    server::build_state,
    AppState,
};
use clearance_config::AppConfig;
use clearance_domain::{
    entities::{NewUser, Role, TokenKind},
    Repositories,
};
use clearance_persistence::InMemoryStore;

pub use serde_json;

/// Build a `.tar.gz` archive holding `files`
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .expect("append archive entry");
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip")
}

/// Sources of a small MIT package with one Apache-2.0 file
pub fn sample_sources() -> Vec<u8> {
    tar_gz(&[
        (
            "package/LICENSE",
            "Copyright (c) 2020 Example Corp\n\nPermission is hereby granted, free of charge, to any person\n",
        ),
        (
            "package/lib/main.c",
            "/* SPDX-License-Identifier: Apache-2.0 */\nint main(void) { return 0; }\n",
        ),
        ("package/README.md", "# example\n"),
    ])
}

/// An API instance with one user and one admin
pub struct TestServer {
    pub app: Router,
    pub state: AppState,
    pub user_token: String,
    pub admin_token: String,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = AppConfig::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.work_dir = dir.path().join("work");
        config.scanner_agent.token = "agent-secret".to_string();

        let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
        let state = build_state(repos, config).expect("build state");

        let mut tokens = Vec::new();
        for (name, role) in [("alice", Role::User), ("root", Role::Admin)] {
            let user = state
                .repos
                .users
                .create(NewUser {
                    username: name.to_string(),
                    password_hash: hash_password("password123").expect("hash"),
                    role,
                })
                .await
                .expect("create user");
            tokens.push(
                issue_token(&state, user.id, TokenKind::Api)
                    .await
                    .expect("issue token"),
            );
        }

        Self {
            app: api_router(state.clone()),
            state,
            admin_token: tokens.pop().expect("admin token"),
            user_token: tokens.pop().expect("user token"),
            _dir: dir,
        }
    }

    /// Send a JSON request; returns the status and the decoded body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Upload `bytes` under `key` through a signed URL
    pub async fn upload(&self, key: &str, bytes: Vec<u8>) {
        let (status, body) = self
            .post("/upload-url", &self.user_token, json!({ "key": key }))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let url = body["presignedUrl"].as_str().expect("presigned url");
        let uri = &url[url.find("/uploads/").expect("upload path")..];

        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri(uri)
                    .body(Body::from(bytes))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Upload `bytes` and scan them as `purls`; returns the scanner job id
    /// once the job completed
    pub async fn scan(&self, key: &str, bytes: Vec<u8>, purls: &[&str]) -> String {
        self.upload(key, bytes).await;
        let (status, body) = self
            .post(
                "/job",
                &self.user_token,
                json!({ "zipFileKey": key, "purls": purls }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let job_id = body["scannerJobId"].as_str().expect("job id").to_string();
        let state = self.wait_for_job(&job_id).await;
        assert_eq!(state, "completed", "job {} ended {}", job_id, state);
        job_id
    }

    /// Poll a job until it completes or fails; returns the final status
    pub async fn wait_for_job(&self, job_id: &str) -> String {
        let uri = format!("/job-state/{}", job_id);
        for _ in 0..500 {
            let (_, body) = self.get(&uri, &self.user_token).await;
            let status = body["state"]["status"].as_str().unwrap_or_default().to_string();
            if status == "completed" || status == "failed" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }
}

/// `/packages/{purl}/...` path segment for a purl
pub fn encoded(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
