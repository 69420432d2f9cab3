use serde::{Deserialize, Serialize};

/// Top-level configuration for the study assistant core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    pub tools: ToolServiceConfig,
    pub audio: AudioConfig,
    pub store: StoreConfig,
    pub context: ContextConfig,
}

/// OpenAI-compatible completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    /// Bearer token; empty means the endpoint is unauthenticated
    /// (e.g. a local inference server).
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            api_key: None,
            model: "llama3".to_string(),
            timeout_secs: 120,
            max_tokens: Some(1024),
            temperature: Some(0.7),
        }
    }
}

/// External tool-execution service (knowledge search).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ToolServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9096".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Speech-to-text / text-to-speech backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub stt_url: String,
    pub tts_url: String,
    pub timeout_secs: u64,
    /// Hard ceiling on input audio length; longer input is rejected
    /// before any backend call.
    pub max_duration_secs: u32,
    pub max_audio_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            stt_url: "http://127.0.0.1:9097".to_string(),
            tts_url: "http://127.0.0.1:9098".to_string(),
            timeout_secs: 60,
            max_duration_secs: 60,
            max_audio_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "studybot.db".to_string(),
        }
    }
}

/// Context-window sizing for completion requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of persisted turns replayed into each request.
    pub window_turns: usize,
    /// Token budget for the assembled request; oldest whole turns are
    /// dropped until the estimate fits.
    pub max_context_tokens: usize,
    /// Override for the built-in study-assistant system prompt.
    pub system_prompt: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_turns: 20,
            max_context_tokens: 16_000,
            system_prompt: None,
        }
    }
}
