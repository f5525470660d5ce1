//! Remote processing service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::types::{HealthResponse, JobStatusResponse, RemoteJobState, RenderSpec, SubmitResponse};

/// Configuration for the remote client.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the processing service
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Fixed polling interval
    pub poll_interval: Duration,
    /// Bounded number of poll attempts before a timeout error
    pub max_poll_attempts: u32,
    /// Transport-level retries for submit/download
    pub max_retries: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8402".to_string(),
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 150,
            max_retries: 2,
        }
    }
}

impl RemoteConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OBSCURA_REMOTE_URL")
                .unwrap_or_else(|_| "http://localhost:8402".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("OBSCURA_REMOTE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("OBSCURA_REMOTE_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            max_poll_attempts: std::env::var("OBSCURA_REMOTE_MAX_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(150),
            max_retries: std::env::var("OBSCURA_REMOTE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the remote processing service.
pub struct RemoteClient {
    http: Client,
    config: RemoteConfig,
}

impl RemoteClient {
    /// Create a new client.
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(RemoteError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> RemoteResult<Self> {
        Self::new(RemoteConfig::from_env())
    }

    /// Check if the service is reachable and healthy.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    Err(_) => false,
                }
            }
            Ok(response) => {
                warn!("Remote health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Remote health check error: {}", e);
                false
            }
        }
    }

    /// Render a source through the remote service: submit, poll to a
    /// terminal state, download the result to `output_path`.
    ///
    /// `on_progress` receives the remote job's 0-100 progress.
    pub async fn render<F>(
        &self,
        source_path: &Path,
        spec: &RenderSpec,
        output_path: &Path,
        on_progress: F,
    ) -> RemoteResult<()>
    where
        F: Fn(u8),
    {
        let job_id = self.submit(source_path, spec).await?;
        self.poll_until_complete(&job_id, on_progress).await?;
        self.download_result(&job_id, output_path).await?;
        info!(job_id, output = ?output_path, "Remote render complete");
        Ok(())
    }

    /// Submit a render job.
    pub async fn submit(&self, source_path: &Path, spec: &RenderSpec) -> RemoteResult<String> {
        let url = format!("{}/v1/jobs", self.config.base_url);
        let spec_json = serde_json::to_string(spec)?;
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "source.mp4".to_string());

        let response = self
            .with_retry(|| async {
                let bytes = tokio::fs::read(source_path).await?;
                let form = Form::new()
                    .part("file", Part::bytes(bytes).file_name(file_name.clone()))
                    .text("spec", spec_json.clone());

                let response = self.http.post(&url).multipart(form).send().await?;
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::request_failed(format!(
                "submit returned {status}: {body}"
            )));
        }

        let submitted: SubmitResponse = response.json().await?;
        debug!(job_id = %submitted.job_id, "Submitted remote render job");
        Ok(submitted.job_id)
    }

    /// Poll a job at a fixed interval until it reaches a terminal state.
    pub async fn poll_until_complete<F>(&self, job_id: &str, on_progress: F) -> RemoteResult<()>
    where
        F: Fn(u8),
    {
        let url = format!("{}/v1/jobs/{}", self.config.base_url, job_id);

        for attempt in 1..=self.config.max_poll_attempts {
            let response = self.http.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(RemoteError::request_failed(format!(
                    "poll returned {}",
                    response.status()
                )));
            }

            let status: JobStatusResponse = response.json().await?;
            if let Some(progress) = status.progress {
                on_progress(progress.min(100));
            }

            match status.status {
                RemoteJobState::Completed => return Ok(()),
                RemoteJobState::Error => {
                    return Err(RemoteError::JobFailed(
                        status.error.unwrap_or_else(|| "unspecified remote error".into()),
                    ));
                }
                _ => {
                    debug!(job_id, attempt, "Remote job still running");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(RemoteError::Timeout {
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Download the finished artifact.
    pub async fn download_result(&self, job_id: &str, output_path: &Path) -> RemoteResult<()> {
        let url = format!("{}/v1/jobs/{}/result", self.config.base_url, job_id);

        let response = self
            .with_retry(|| async { Ok(self.http.get(&url).send().await?) })
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::request_failed(format!(
                "download returned {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, &bytes).await?;
        Ok(())
    }

    /// Execute a transport operation with exponential-backoff retry.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RemoteResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RemoteResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Remote request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| RemoteError::request_failed("unknown error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_models::EncodingConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> RemoteConfig {
        RemoteConfig {
            base_url,
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
            max_poll_attempts: 5,
            max_retries: 1,
        }
    }

    fn spec() -> RenderSpec {
        RenderSpec {
            video_filter: Some("[0:v]scale=-2:720[vout]".into()),
            audio_filter: None,
            encoding: EncodingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_render_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "r-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/r-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "completed", "progress": 100}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/r-1/result"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rendered".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        tokio::fs::write(&source, b"source bytes").await.unwrap();

        let client = RemoteClient::new(test_config(server.uri())).unwrap();
        client.render(&source, &spec(), &output, |_| {}).await.unwrap();

        let rendered = tokio::fs::read(&output).await.unwrap();
        assert_eq!(rendered, b"rendered");
    }

    #[tokio::test]
    async fn test_poll_timeout_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/r-2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "processing"})),
            )
            .mount(&server)
            .await;

        let client = RemoteClient::new(test_config(server.uri())).unwrap();
        let err = client.poll_until_complete("r-2", |_| {}).await.unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { attempts: 5 }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_remote_error_state_fails_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/r-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "error", "error": "codec unsupported"}),
            ))
            .mount(&server)
            .await;

        let client = RemoteClient::new(test_config(server.uri())).unwrap();
        let err = client.poll_until_complete("r-3", |_| {}).await.unwrap_err();
        assert!(matches!(err, RemoteError::JobFailed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check_down_service() {
        let client = RemoteClient::new(test_config("http://127.0.0.1:1".into())).unwrap();
        assert!(!client.health_check().await);
    }
}
