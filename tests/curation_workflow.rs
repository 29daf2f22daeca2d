//! License conclusions, bulk conclusions and path exclusions over HTTP

use axum::http::StatusCode;
use clearance_integration_tests::{
    encoded, sample_sources,
    serde_json::{json, Value},
    TestServer,
};

const PURL: &str = "pkg:npm/example@1.0.0";

async fn scanned() -> TestServer {
    let server = TestServer::start().await;
    server.scan("example.tgz", sample_sources(), &[PURL]).await;
    server
}

async fn sha_of(server: &TestServer, path: &str) -> String {
    let uri = format!(
        "/packages/{}/filetrees/{}/files",
        encoded(PURL),
        encoded(path)
    );
    let (_, body) = server.get(&uri, &server.user_token).await;
    body["file"]["sha256"].as_str().unwrap().to_string()
}

fn conclusions(body: &Value) -> &Vec<Value> {
    body["licenseConclusions"].as_array().unwrap()
}

#[tokio::test]
async fn test_license_conclusion_lifecycle() {
    let server = scanned().await;
    let sha = sha_of(&server, "package/LICENSE").await;

    let (status, body) = server
        .post(
            "/license-conclusions",
            &server.user_token,
            json!({
                "concludedLicenseExpressionSPDX": "MIT",
                "detectedLicenseExpressionSPDX": null,
                "comment": "checked the text",
                "contextPurl": PURL,
                "fileSha256": sha,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let conclusion = &body["licenseConclusion"];
    assert_eq!(conclusion["user"]["username"], "alice");
    assert_eq!(conclusion["local"], false);
    let id = conclusion["id"].as_i64().unwrap();

    let (_, body) = server
        .post("/package-configuration", &server.user_token, json!({"purl": PURL}))
        .await;
    assert_eq!(
        conclusions(&body),
        &vec![json!({
            "path": "package/LICENSE",
            "detectedLicenseExpressionSPDX": "MIT",
            "concludedLicenseExpressionSPDX": "MIT",
            "comment": "checked the text",
        })]
    );

    // only the owner or an admin may change it
    let uri = format!("/license-conclusions/{}", id);
    let (status, _) = server
        .put(&uri, &server.admin_token, json!({"comment": null}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.put(&uri, &server.user_token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server
        .get("/license-conclusions?username=alice", &server.user_token)
        .await;
    assert_eq!(conclusions(&body).len(), 1);
    assert_eq!(conclusions(&body)[0]["comment"], Value::Null);

    let (status, _) = server.delete(&uri, &server.user_token).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server
        .get("/license-conclusions/count", &server.user_token)
        .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_bulk_conclusion_lifecycle() {
    let server = scanned().await;

    let (status, body) = server
        .post(
            "/bulk-conclusions/preview",
            &server.user_token,
            json!({"pattern": "package/lib/**", "purl": PURL}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedPaths"], json!(["package/lib/main.c"]));

    let (status, body) = server
        .post(
            "/bulk-conclusions",
            &server.user_token,
            json!({
                "pattern": "package/lib/**",
                "concludedLicenseExpressionSPDX": "Apache-2.0",
                "contextPurl": PURL,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["matchedPathsCount"], 1);
    assert_eq!(body["addedLicenseConclusionsCount"], 1);
    let bulk_id = body["bulkConclusionId"].as_i64().unwrap();

    // conclusions owned by a bulk conclusion are changed through it
    let (_, body) = server
        .get(
            &format!("/license-conclusions?contextPurl={}", encoded(PURL)),
            &server.user_token,
        )
        .await;
    let owned_id = conclusions(&body)[0]["id"].as_i64().unwrap();
    assert_eq!(conclusions(&body)[0]["bulkConclusionId"], bulk_id);
    let (status, _) = server
        .delete(&format!("/license-conclusions/{}", owned_id), &server.user_token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server
        .get(
            &format!("/bulk-conclusions/{}/affected-files", bulk_id),
            &server.user_token,
        )
        .await;
    assert_eq!(
        body["affectedFiles"]["inContextPurl"],
        json!(["package/lib/main.c"])
    );

    let (status, body) = server
        .put(
            &format!("/bulk-conclusions/{}", bulk_id),
            &server.user_token,
            json!({"pattern": "package/**/*.md"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedPathsCount"], 1);
    assert_eq!(body["addedLicenseConclusionsCount"], 1);
    assert_eq!(body["deletedLicenseConclusionsCount"], 1);

    let (status, body) = server
        .put(
            &format!("/bulk-conclusions/{}", bulk_id),
            &server.user_token,
            json!({"pattern": "nothing/**"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["path"], "pattern");

    let (status, _) = server
        .delete(&format!("/bulk-conclusions/{}", bulk_id), &server.user_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server
        .get("/license-conclusions/count", &server.user_token)
        .await;
    assert_eq!(body["count"], 0);
    let (status, _) = server
        .get(&format!("/bulk-conclusions/{}", bulk_id), &server.user_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_path_exclusions_in_configuration() {
    let server = scanned().await;

    let (status, body) = server
        .post(
            "/path-exclusions",
            &server.user_token,
            json!({
                "purl": PURL,
                "pattern": "package/README.md",
                "reason": "DOCUMENTATION_OF",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["pathExclusion"]["id"].as_i64().unwrap();

    let (status, body) = server
        .post(
            "/path-exclusions",
            &server.user_token,
            json!({"purl": PURL, "pattern": "[", "reason": "OTHER"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["path"], "pattern");

    let (_, body) = server
        .post("/package-configuration", &server.user_token, json!({"purl": PURL}))
        .await;
    assert_eq!(
        body["pathExclusions"],
        json!([{"pattern": "package/README.md", "reason": "DOCUMENTATION_OF", "comment": null}])
    );

    let (status, _) = server
        .put(
            &format!("/path-exclusions/{}", id),
            &server.admin_token,
            json!({"reason": "TEST_OF"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server
        .get("/path-exclusions?reason=TEST_OF", &server.user_token)
        .await;
    assert_eq!(body["pathExclusions"].as_array().unwrap().len(), 1);

    let (status, _) = server
        .delete(&format!("/path-exclusions/{}", id), &server.user_token)
        .await;
    assert_eq!(status, StatusCode::OK);
}
