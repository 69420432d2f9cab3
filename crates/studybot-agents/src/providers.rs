use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studybot_common::{Result, ToolCall};

/// Trait for completion-service integrations (OpenAI-compatible servers,
/// hosted APIs, test doubles).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider identifier (e.g. "openai-compat").
    fn provider_id(&self) -> &str;

    /// Send one completion request and classify the response.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult>;

    /// Check if the provider is reachable and configured.
    async fn health_check(&self) -> Result<bool>;
}

/// Either a direct text answer or a request to run one or more tools.
///
/// The explicit variant forces exhaustive handling at every call site;
/// there is no "message that may or may not carry tool_calls" shape
/// anywhere above the wire layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompletionResult {
    FinalAnswer {
        text: String,
    },
    ToolCallRequest {
        /// Natural-language text emitted alongside the calls, if any.
        assistant_text: Option<String>,
        /// Ordered as requested; `call_id`s are unique within one response.
        calls: Vec<ToolCall>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub tools: Vec<ToolSchema>,
}

/// One wire message. Role decides which optional fields are meaningful:
/// assistant messages may carry `tool_calls`, tool messages must carry
/// `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(text: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: text,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Tool declaration sent with every completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
