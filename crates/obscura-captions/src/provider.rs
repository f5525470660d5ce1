//! Transcription providers.
//!
//! The cloud provider speaks an asynchronous submit/poll protocol with
//! word-level confidence and timestamps. The simulated provider stands in
//! when no cloud endpoint is configured so the pipeline can still produce
//! deterministic captions.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CaptionError, CaptionResult};
use obscura_models::CaptionWord;

/// A completed transcription: ordered words with timing and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    /// BCP-47 language tag
    pub language: String,
    /// Words in chronological order
    pub words: Vec<CaptionWord>,
}

/// Speech-to-text provider.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribe an isolated audio file.
    async fn transcribe(&self, audio_path: &Path) -> CaptionResult<Transcription>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Configuration for the cloud speech provider.
#[derive(Debug, Clone)]
pub struct CloudSpeechConfig {
    /// Base URL of the speech service
    pub base_url: String,
    /// API key; the provider is unconfigured without one
    pub api_key: Option<String>,
    /// Fixed polling interval
    pub poll_interval: Duration,
    /// Bounded number of poll attempts before a timeout error
    pub max_poll_attempts: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CloudSpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://speech.example.com".to_string(),
            api_key: None,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 60,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CloudSpeechConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OBSCURA_SPEECH_URL")
                .unwrap_or_else(|_| "https://speech.example.com".to_string()),
            api_key: std::env::var("OBSCURA_SPEECH_API_KEY").ok(),
            poll_interval: Duration::from_millis(
                std::env::var("OBSCURA_SPEECH_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            max_poll_attempts: std::env::var("OBSCURA_SPEECH_MAX_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            request_timeout: Duration::from_secs(
                std::env::var("OBSCURA_SPEECH_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Whether the provider has enough configuration to be used.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Cloud speech-to-text provider (submit, then poll to a terminal state).
pub struct CloudSpeechProvider {
    http: Client,
    config: CloudSpeechConfig,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    words: Option<Vec<WireWord>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireWord {
    word: String,
    confidence: f64,
    start_time: f64,
    end_time: f64,
}

impl CloudSpeechProvider {
    /// Create a new provider.
    pub fn new(config: CloudSpeechConfig) -> CaptionResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> CaptionResult<Self> {
        Self::new(CloudSpeechConfig::from_env())
    }

    /// Whether this provider can be used at all.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn submit(&self, audio_path: &Path) -> CaptionResult<String> {
        let bytes = tokio::fs::read(audio_path).await?;
        if bytes.is_empty() {
            return Err(CaptionError::InvalidAudio(format!(
                "empty audio file: {}",
                audio_path.display()
            )));
        }

        let url = format!("{}/v1/transcriptions", self.config.base_url);
        let mut request = self
            .http
            .post(&url)
            .header("content-type", "audio/mp4")
            .body(bytes);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::provider(format!(
                "submit returned {status}: {body}"
            )));
        }

        let submitted: SubmitResponse = response.json().await?;
        debug!(job_id = %submitted.job_id, "Submitted transcription job");
        Ok(submitted.job_id)
    }

    async fn poll_until_terminal(&self, job_id: &str) -> CaptionResult<Transcription> {
        let url = format!("{}/v1/transcriptions/{}", self.config.base_url, job_id);

        for attempt in 1..=self.config.max_poll_attempts {
            let mut request = self.http.get(&url);
            if let Some(key) = &self.config.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                return Err(CaptionError::provider(format!("poll returned {status}")));
            }

            let poll: PollResponse = response.json().await?;
            match poll.status.as_str() {
                "completed" => {
                    let words = poll
                        .words
                        .unwrap_or_default()
                        .into_iter()
                        .map(|w| {
                            CaptionWord::new(
                                w.word,
                                w.confidence.clamp(0.0, 1.0),
                                w.start_time,
                                w.end_time,
                            )
                        })
                        .collect();
                    return Ok(Transcription {
                        language: poll.language.unwrap_or_else(|| "en-US".to_string()),
                        words,
                    });
                }
                "error" => {
                    return Err(CaptionError::provider(
                        poll.error.unwrap_or_else(|| "unspecified provider error".into()),
                    ));
                }
                other => {
                    debug!(attempt, status = other, "Transcription still pending");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        warn!(
            job_id,
            attempts = self.config.max_poll_attempts,
            "Transcription polling exhausted"
        );
        Err(CaptionError::Timeout {
            attempts: self.config.max_poll_attempts,
        })
    }
}

#[async_trait]
impl TranscriptionProvider for CloudSpeechProvider {
    async fn transcribe(&self, audio_path: &Path) -> CaptionResult<Transcription> {
        if !self.is_configured() {
            return Err(CaptionError::ProviderUnavailable);
        }
        let job_id = self.submit(audio_path).await?;
        self.poll_until_terminal(&job_id).await
    }

    fn name(&self) -> &'static str {
        "cloud_speech"
    }
}

/// Deterministic local provider used when the cloud provider is
/// unavailable or unconfigured.
pub struct SimulatedProvider {
    duration_secs: f64,
}

const SIMULATED_PHRASE: &[&str] = &[
    "this", "recording", "has", "been", "anonymized", "for", "your", "protection",
];

/// Cadence of simulated speech, seconds per word.
const SIMULATED_WORD_SPACING: f64 = 0.4;

impl SimulatedProvider {
    /// Create a provider that fills `duration_secs` of simulated speech.
    pub fn new(duration_secs: f64) -> Self {
        Self { duration_secs }
    }
}

#[async_trait]
impl TranscriptionProvider for SimulatedProvider {
    async fn transcribe(&self, audio_path: &Path) -> CaptionResult<Transcription> {
        if !audio_path.exists() {
            return Err(CaptionError::InvalidAudio(format!(
                "audio file missing: {}",
                audio_path.display()
            )));
        }

        let mut words = Vec::new();
        let mut t = 0.0;
        let mut i = 0;
        while t + SIMULATED_WORD_SPACING <= self.duration_secs.max(SIMULATED_WORD_SPACING) {
            let word = SIMULATED_PHRASE[i % SIMULATED_PHRASE.len()];
            words.push(CaptionWord::new(word, 0.92, t, t + SIMULATED_WORD_SPACING));
            t += SIMULATED_WORD_SPACING;
            i += 1;
        }

        Ok(Transcription {
            language: "en-US".to_string(),
            words,
        })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> CloudSpeechConfig {
        CloudSpeechConfig {
            base_url,
            api_key: Some("test-key".to_string()),
            poll_interval: Duration::from_millis(5),
            max_poll_attempts: 3,
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn write_audio(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let audio = dir.path().join("clip.m4a");
        tokio::fs::write(&audio, b"fake audio bytes").await.unwrap();
        audio
    }

    #[tokio::test]
    async fn test_cloud_provider_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "job-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/transcriptions/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "language": "en-US",
                "words": [
                    {"word": "hello", "confidence": 0.97, "start_time": 0.0, "end_time": 0.5},
                    {"word": "world", "confidence": 0.95, "start_time": 0.6, "end_time": 1.1}
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir).await;

        let provider = CloudSpeechProvider::new(test_config(server.uri())).unwrap();
        let transcription = provider.transcribe(&audio).await.unwrap();
        assert_eq!(transcription.words.len(), 2);
        assert_eq!(transcription.words[0].word, "hello");
        assert_eq!(transcription.language, "en-US");
    }

    #[tokio::test]
    async fn test_cloud_provider_poll_timeout_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "job-2"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/transcriptions/job-2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "processing"})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir).await;

        let provider = CloudSpeechProvider::new(test_config(server.uri())).unwrap();
        let err = provider.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, CaptionError::Timeout { attempts: 3 }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cloud_provider_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "job-3"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/transcriptions/job-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "error", "error": "unsupported codec"}),
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir).await;

        let provider = CloudSpeechProvider::new(test_config(server.uri())).unwrap();
        let err = provider.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, CaptionError::Provider(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let provider = CloudSpeechProvider::new(CloudSpeechConfig::default()).unwrap();
        let err = provider.transcribe(Path::new("/tmp/a.m4a")).await.unwrap_err();
        assert!(matches!(err, CaptionError::ProviderUnavailable));
    }

    #[tokio::test]
    async fn test_simulated_provider_fills_duration() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio(&dir).await;

        let provider = SimulatedProvider::new(10.0);
        let transcription = provider.transcribe(&audio).await.unwrap();
        assert!(!transcription.words.is_empty());

        // Words are chronological and bounded by the duration
        let mut prev_end = 0.0;
        for w in &transcription.words {
            assert!(w.start_time >= prev_end - f64::EPSILON);
            prev_end = w.end_time;
        }
        assert!(prev_end <= 10.0 + f64::EPSILON);
    }
}
