//! Speech provider client.
//!
//! The [`SpeechSynthesizer`] trait is the seam between orchestration and the
//! network. [`OpenAiSpeechClient`] implements it against the OpenAI
//! `/audio/speech` endpoint using reqwest.

use crate::config::{ProviderConfig, ResponseFormat, Voice};
use crate::TtsError;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use futures_core::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Invalid OpenAI API key; check your configuration")]
    InvalidCredentials(String),

    #[error("OpenAI API quota exceeded; check your billing settings")]
    QuotaExceeded(String),

    #[error("OpenAI API rate limit reached; wait and retry")]
    RateLimited(String),

    #[error("Speech generation timed out")]
    Timeout,

    #[error("Speech generation cancelled")]
    Cancelled,

    #[error("Speech generation failed: {0}")]
    Provider(String),

    #[error("Failed to write audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk {} of {total} failed: {source}", .index + 1)]
    ChunkFailed {
        index: usize,
        total: usize,
        source: Box<SynthesisError>,
    },
}

impl SynthesisError {
    /// Map a provider message to a user-facing category.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("api key") || lower.contains("api_key") {
            SynthesisError::InvalidCredentials(message)
        } else if lower.contains("quota") {
            SynthesisError::QuotaExceeded(message)
        } else if lower.contains("rate limit") {
            SynthesisError::RateLimited(message)
        } else {
            SynthesisError::Provider(message)
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SynthesisError::InvalidCredentials(_) => "INVALID_API_KEY",
            SynthesisError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            SynthesisError::RateLimited(_) => "RATE_LIMITED",
            SynthesisError::Timeout => "TIMEOUT",
            SynthesisError::Cancelled => "CANCELLED",
            SynthesisError::Provider(_) => "PROVIDER_ERROR",
            SynthesisError::Io(_) => "IO_ERROR",
            SynthesisError::ChunkFailed { source, .. } => source.code(),
        }
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout
        } else {
            SynthesisError::classify(e.to_string())
        }
    }
}

/// One provider call: a single chunk of text with resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Voice,
    pub speed: f64,
    pub response_format: ResponseFormat,
    /// Carried for cache identity; not sent to the provider
    pub instructions: Option<String>,
}

pub type AudioByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Audio returned by a provider, either buffered or streamed.
pub enum SpeechAudio {
    RawBytes(Bytes),
    ByteStream(AudioByteStream),
}

impl fmt::Debug for SpeechAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechAudio::RawBytes(b) => f.debug_tuple("RawBytes").field(&b.len()).finish(),
            SpeechAudio::ByteStream(_) => f.write_str("ByteStream(..)"),
        }
    }
}

impl SpeechAudio {
    /// Write the audio to `path`, returning the number of bytes written.
    pub async fn write_to(self, path: &Path) -> Result<u64, SynthesisError> {
        let mut file = tokio::fs::File::create(path).await?;
        let written = match self {
            SpeechAudio::RawBytes(bytes) => {
                file.write_all(&bytes).await?;
                bytes.len() as u64
            }
            SpeechAudio::ByteStream(mut stream) => {
                let mut total = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    total += chunk.len() as u64;
                }
                total
            }
        };
        file.flush().await?;
        Ok(written)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Produce audio for one request.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, SynthesisError>;
}

/// OpenAI text-to-speech client.
pub struct OpenAiSpeechClient {
    http: reqwest::Client,
    cfg: ProviderConfig,
}

impl OpenAiSpeechClient {
    pub fn new(cfg: ProviderConfig) -> crate::Result<Self> {
        if cfg.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(TtsError::Config(
                "OPENAI_API_KEY environment variable is required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| TtsError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    #[tracing::instrument(skip(self, request), fields(voice = %request.voice, chars = request.text.chars().count()))]
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, SynthesisError> {
        let body = json!({
            "model": self.cfg.model,
            "input": request.text,
            "voice": request.voice.as_str(),
            "response_format": request.response_format.as_str(),
            "speed": request.speed,
        });

        debug!(target: "openai_tts", url = %self.endpoint(), "Requesting speech");
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.cfg.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(target: "openai_tts", %status, "Speech request rejected");
            return Err(SynthesisError::classify(format!("status={status} body={text}")));
        }

        if self.cfg.stream_response {
            let stream = resp
                .bytes_stream()
                .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
            Ok(SpeechAudio::ByteStream(Box::pin(stream)))
        } else {
            Ok(SpeechAudio::RawBytes(resp.bytes().await?))
        }
    }
}
