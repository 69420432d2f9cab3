use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use studybot_common::{Error, Result, ToolCall};

use crate::providers::{
    ChatMessage, ChatRole, CompletionClient, CompletionRequest, CompletionResult, ToolSchema,
};

/// Completion adapter for OpenAI-compatible `/chat/completions` endpoints.
///
/// No retry: an upstream failure is terminal for the current turn and is
/// surfaced to the orchestrator as `Error::Upstream`.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    fn bearer(&self) -> String {
        // Some local inference servers insist on an Authorization header
        // even when they ignore the token.
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => format!("Bearer {key}"),
            _ => "Bearer none".to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn provider_id(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let url = format!("{}/chat/completions", self.base_url);
        let wire_request = convert_request(request);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", self.bearer())
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| Error::Upstream {
                status: None,
                message: if e.is_timeout() {
                    "completion request timed out".to_string()
                } else {
                    format!("completion request failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message: format!("completion endpoint returned {status}: {body}"),
            });
        }

        let wire_response: WireResponse = response.json().await.map_err(|e| Error::Upstream {
            status: None,
            message: format!("malformed completion response: {e}"),
        })?;

        convert_response(wire_response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("Authorization", self.bearer())
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn convert_request(request: &CompletionRequest) -> WireRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        messages.push(WireMessage::System {
            content: system.clone(),
        });
    }

    for msg in &request.messages {
        messages.push(convert_message(msg));
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(request.tools.iter().map(convert_tool).collect())
    };
    let tool_choice = tools.as_ref().map(|_| "auto".to_string());

    WireRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        tools,
        tool_choice,
    }
}

fn convert_message(msg: &ChatMessage) -> WireMessage {
    match msg.role {
        ChatRole::System => WireMessage::System {
            content: msg.content.clone().unwrap_or_default(),
        },
        ChatRole::User => WireMessage::User {
            content: msg.content.clone().unwrap_or_default(),
        },
        ChatRole::Assistant => {
            let tool_calls = if msg.tool_calls.is_empty() {
                None
            } else {
                Some(
                    msg.tool_calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.call_id.clone(),
                            kind: "function".to_string(),
                            function: WireFunctionCall {
                                name: call.tool_name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            };
            WireMessage::Assistant {
                content: msg.content.clone(),
                tool_calls,
            }
        }
        ChatRole::Tool => WireMessage::Tool {
            tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            content: msg.content.clone().unwrap_or_default(),
        },
    }
}

fn convert_tool(schema: &ToolSchema) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: WireFunctionDefinition {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters.clone(),
        },
    }
}

fn convert_response(response: WireResponse) -> Result<CompletionResult> {
    let choice = response.choices.into_iter().next().ok_or(Error::Upstream {
        status: None,
        message: "completion response contained no choices".to_string(),
    })?;

    let message = choice.message;
    match message.tool_calls {
        Some(tool_calls) if !tool_calls.is_empty() => {
            let calls = tool_calls
                .into_iter()
                .map(|tc| {
                    // Arguments arrive as a JSON-encoded string; keep the raw
                    // string as a value if it does not parse.
                    let arguments: serde_json::Value =
                        serde_json::from_str(&tc.function.arguments)
                            .unwrap_or(serde_json::Value::String(tc.function.arguments));
                    ToolCall {
                        call_id: tc.id,
                        tool_name: tc.function.name,
                        arguments,
                    }
                })
                .collect();
            Ok(CompletionResult::ToolCallRequest {
                assistant_text: message.content.filter(|text| !text.is_empty()),
                calls,
            })
        }
        _ => Ok(CompletionResult::FinalAnswer {
            text: message.content.unwrap_or_default(),
        }),
    }
}

// Wire types for the OpenAI-compatible chat completions API.

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionDefinition,
}

#[derive(Serialize)]
struct WireFunctionDefinition {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}
