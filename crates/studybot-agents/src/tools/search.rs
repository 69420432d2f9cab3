use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use studybot_common::{ToolFailureKind, ToolResult};
use tracing::warn;

use crate::tools::Tool;

/// Shared HTTP plumbing for tools backed by the external tool-execution
/// service. The service executes a named tool and returns a JSON payload;
/// the payload is passed back to the completion service verbatim, so
/// nothing here inspects it.
#[derive(Clone)]
pub struct ToolServiceClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ToolCallBody<'a> {
    name: &'a str,
    arguments: serde_json::Value,
}

impl ToolServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Execute one tool call against the service. All failures come back
    /// as `ToolResult::Failure`; retry policy belongs to the caller.
    async fn call(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        let url = format!("{}/tools/call", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ToolCallBody { name, arguments })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("tool '{}' timed out after {:?}", name, self.timeout);
                return ToolResult::Failure {
                    kind: ToolFailureKind::Timeout,
                    message: format!("tool '{name}' timed out"),
                };
            }
            Err(e) => {
                return ToolResult::Failure {
                    kind: ToolFailureKind::RemoteError,
                    message: format!("tool request failed: {e}"),
                };
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return ToolResult::Failure {
                kind: ToolFailureKind::NotFound,
                message: format!("tool service does not know '{name}'"),
            };
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ToolResult::Failure {
                kind: ToolFailureKind::RemoteError,
                message: format!("tool service returned {status}: {body}"),
            };
        }

        match response.json::<serde_json::Value>().await {
            Ok(payload) => ToolResult::Success { payload },
            Err(e) => ToolResult::Failure {
                kind: ToolFailureKind::RemoteError,
                message: format!("tool service returned malformed JSON: {e}"),
            },
        }
    }
}

/// Free-text search over the question/answer dataset. Returns an ordered
/// list of candidate records with relevance scores.
pub struct KnowledgeSearchTool {
    service: ToolServiceClient,
}

impl KnowledgeSearchTool {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service: ToolServiceClient::new(base_url, timeout),
        }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the study dataset for question-answer pairs relevant to a query. \
         Use this whenever the user asks a specific factual question. Pass the \
         user's question as the query."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text query to match against the dataset"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> ToolResult {
        self.service.call("search", arguments).await
    }
}

/// Fetch a random practice question, optionally filtered by difficulty
/// and topic.
pub struct RandomQuestionTool {
    service: ToolServiceClient,
}

impl RandomQuestionTool {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service: ToolServiceClient::new(base_url, timeout),
        }
    }
}

#[async_trait]
impl Tool for RandomQuestionTool {
    fn name(&self) -> &str {
        "get_random_question"
    }

    fn description(&self) -> &str {
        "Fetch a random practice question. Use this when the user wants to test \
         their knowledge. Ask the user for a difficulty (beginner, intermediate, \
         advanced) and a topic first; omit either to mean 'any'."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "difficulty": {
                    "type": "string",
                    "enum": ["beginner", "intermediate", "advanced"],
                    "description": "Desired difficulty; omit for any"
                },
                "topic": {
                    "type": "string",
                    "description": "Topic to draw from; omit for any"
                }
            },
            "required": []
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> ToolResult {
        self.service.call("get_random_question", arguments).await
    }
}
