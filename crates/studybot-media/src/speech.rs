use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studybot_common::{Error, Result};
use tracing::{info, warn};

use crate::cleanup::clean_for_speech;
use crate::probe;

/// Recognized text for one piece of input audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
}

/// Synthesized audio for one piece of reply text.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: String,
}

/// Audio-to-text transcription backend.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;
}

/// Text-to-audio synthesis backend.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// Wraps the speech backends around the text conversation loop without
/// changing its contract.
///
/// Input is validated before any backend call: size ceiling, an audio
/// signature check, and a hard duration limit for WAV input. Neither
/// direction retries; failures surface to the caller as-is.
pub struct AudioTurnAdapter {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    max_duration_secs: u32,
    max_audio_bytes: usize,
}

impl AudioTurnAdapter {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        max_duration_secs: u32,
        max_audio_bytes: usize,
    ) -> Self {
        Self {
            stt,
            tts,
            max_duration_secs,
            max_audio_bytes,
        }
    }

    /// Recognize one audio input as text. Over-limit input is rejected
    /// here, before the backend is ever contacted, to bound cost and
    /// latency.
    pub async fn speech_to_text(&self, audio: &[u8]) -> Result<Transcript> {
        if audio.is_empty() {
            return Err(Error::Transcription("empty audio input".to_string()));
        }
        if audio.len() > self.max_audio_bytes {
            return Err(Error::Transcription(format!(
                "audio input is {} bytes, larger than the {} byte limit",
                audio.len(),
                self.max_audio_bytes
            )));
        }
        if !probe::looks_like_audio(audio) {
            return Err(Error::Transcription(
                "input does not look like a supported audio format".to_string(),
            ));
        }
        if let Some(duration) = probe::wav_duration_secs(audio) {
            if duration > self.max_duration_secs as f64 {
                warn!(
                    "rejecting {duration:.1}s audio input, limit is {}s",
                    self.max_duration_secs
                );
                return Err(Error::AudioTooLong {
                    actual_secs: duration,
                    limit_secs: self.max_duration_secs,
                });
            }
        }

        let transcript = self.stt.transcribe(audio).await?;
        info!(
            "transcribed {} bytes of audio into {} chars",
            audio.len(),
            transcript.text.len()
        );
        Ok(transcript)
    }

    /// Synthesize one reply. Markdown is stripped first; models write for
    /// screens, not speakers.
    pub async fn text_to_speech(&self, text: &str) -> Result<SynthesizedAudio> {
        let cleaned = clean_for_speech(text);
        if cleaned.is_empty() {
            return Err(Error::Synthesis(
                "no speakable text after cleanup".to_string(),
            ));
        }
        self.tts.synthesize(&cleaned).await
    }
}
