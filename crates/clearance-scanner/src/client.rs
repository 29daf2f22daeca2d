//! Authenticated JSON client shared by the HTTP reporter and dispatcher

use reqwest::{header, Method, Response, Url};
use serde::Serialize;
use tracing::debug;

use crate::{
    config::ClientConfig,
    error::{Result, ScannerError},
    retry::Backoff,
};

/// JSON-over-HTTP client bound to one base URL and bearer token
pub struct AgentClient {
    inner: reqwest::Client,
    base_url: Url,
    token: String,
    backoff: Backoff,
}

impl AgentClient {
    pub fn new(base_url: &str, token: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| ScannerError::InvalidUrl(e.to_string()))?;

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ScannerError::BuildError(e.to_string()))?;

        let backoff = Backoff::from_config(&config);

        Ok(Self {
            inner,
            base_url,
            token: token.into(),
            backoff,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ScannerError::InvalidUrl(e.to_string()))
    }

    /// Send `body` as JSON, retrying transient failures
    pub async fn send_json<B>(&self, method: Method, path: &str, body: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let payload = serde_json::to_vec(body).map_err(|e| ScannerError::Report(e.to_string()))?;
        debug!(%method, %url, "HTTP request");

        self.backoff
            .run(|| {
                let request = self
                    .inner
                    .request(method.clone(), url.clone())
                    .bearer_auth(&self.token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(payload.clone());
                async move { check(request.send().await?).await }
            })
            .await
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = self.url(path)?;
        debug!(%url, "HTTP GET");
        self.backoff
            .run(|| {
                let request = self.inner.get(url.clone()).bearer_auth(&self.token);
                async move { check(request.send().await?).await }
            })
            .await
    }
}

/// Turn non-2xx responses into errors carrying the body
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ScannerError::HttpStatus { status, message })
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_json, header as has_header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[test]
    fn test_invalid_base_url() {
        let result = AgentClient::new("not a url", "t", ClientConfig::fast());
        assert!(matches!(result, Err(ScannerError::InvalidUrl(_))));
    }

    #[test]
    fn test_paths_join_below_base() {
        let client = AgentClient::new("http://api.local/v1", "t", ClientConfig::fast()).unwrap();
        assert_eq!(client.url("/job-state/1").unwrap().as_str(), "http://api.local/v1/job-state/1");
    }

    #[tokio::test]
    async fn test_send_json_carries_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job"))
            .and(has_header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({"a": 1})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = AgentClient::new(&server.uri(), "secret", ClientConfig::fast()).unwrap();
        client
            .send_json(Method::POST, "job", &serde_json::json!({"a": 1}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"message\":\"nope\"}"))
            .mount(&server)
            .await;

        let client = AgentClient::new(&server.uri(), "t", ClientConfig::fast()).unwrap();
        match client.get("job/9").await {
            Err(ScannerError::HttpStatus { status, message }) => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.status())),
        }
    }
}
