use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use studybot_common::{Error, Result};

use crate::speech::{SpeechToText, SynthesizedAudio, TextToSpeech, Transcript};

/// Speech-to-text client for a Whisper-style HTTP transcription server:
/// raw audio in, `{ "text": ..., "language": ... }` out.
#[derive(Clone)]
pub struct WhisperHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
    language: Option<String>,
}

impl WhisperHttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperHttpClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript> {
        let url = format!("{}/transcribe", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Content-Type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                Error::Transcription(if e.is_timeout() {
                    "transcription request timed out".to_string()
                } else {
                    format!("transcription request failed: {e}")
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "transcription backend returned {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("malformed transcription response: {e}")))?;

        Ok(Transcript {
            text: parsed.text.trim().to_string(),
            language: parsed.language,
        })
    }
}

/// Text-to-speech client for an HTTP synthesis server: `{ "text": ... }`
/// in, encoded audio bytes out.
#[derive(Clone)]
pub struct SpeechHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl SpeechHttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextToSpeech for SpeechHttpClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let url = format!("{}/synthesize", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| {
                Error::Synthesis(if e.is_timeout() {
                    "synthesis request timed out".to_string()
                } else {
                    format!("synthesis request failed: {e}")
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "synthesis backend returned {status}: {body}"
            )));
        }

        let format = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("audio/"))
            .unwrap_or("mp3")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("failed to read synthesis response: {e}")))?;

        if bytes.is_empty() {
            return Err(Error::Synthesis(
                "synthesis backend returned no audio".to_string(),
            ));
        }

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            format,
        })
    }
}
