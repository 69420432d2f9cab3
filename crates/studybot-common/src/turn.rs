use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SessionId, UserId};

/// One atomic unit of conversation history.
///
/// A turn is either plain text from the user or assistant, or a
/// `ToolInvocation` record bundling the model's tool-call request with the
/// results for every call. Calls and results always travel together in one
/// turn so a replayed context window can never see a call without its
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: TurnRole,
    /// Text body; empty for pure tool-invocation turns.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolCallResult>,
    /// Natural-language text the model emitted alongside its tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ToolInvocation,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::ToolInvocation => "tool_invocation",
        };
        f.write_str(name)
    }
}

/// A structured request from the completion service naming a tool and its
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// The outcome of executing one tool call, keyed back to it by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub outcome: ToolResult,
}

/// Result of one tool execution. Failures are ordinary data: they are fed
/// back to the completion service as the tool result so the model can
/// decide how to respond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: serde_json::Value },
    Failure { kind: ToolFailureKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// No tool with the requested name exists.
    NotFound,
    /// The tool-execution service did not answer within the deadline.
    Timeout,
    /// The tool executed but reported failure.
    RemoteError,
}

impl fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolFailureKind::NotFound => "not_found",
            ToolFailureKind::Timeout => "timeout",
            ToolFailureKind::RemoteError => "remote_error",
        };
        f.write_str(name)
    }
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: TurnRole::User,
            content: text.into(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            assistant_content: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: TurnRole::Assistant,
            content: text.into(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            assistant_content: None,
        }
    }

    pub fn tool_invocation(
        assistant_content: Option<String>,
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolCallResult>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: TurnRole::ToolInvocation,
            content: String::new(),
            timestamp: Utc::now(),
            tool_calls,
            tool_results,
            assistant_content,
        }
    }

    /// Whether every tool call has exactly one result with a matching
    /// `call_id`, in the same turn.
    pub fn is_paired(&self) -> bool {
        if self.tool_calls.len() != self.tool_results.len() {
            return false;
        }
        self.tool_calls.iter().all(|call| {
            self.tool_results
                .iter()
                .filter(|r| r.call_id == call.call_id)
                .count()
                == 1
        })
    }
}

/// A conversation thread. Owned exclusively by its user; mutated on every
/// appended turn, destroyed on explicit delete (cascading to its turns).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub owner_user_id: UserId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_turn_factory() {
        let start = Utc::now();
        let turn = Turn::user("hello");
        let end = Utc::now();

        assert!(!turn.id.is_empty());
        assert_eq!(turn.role, TurnRole::User);
        assert_eq!(turn.content, "hello");
        assert!(turn.tool_calls.is_empty());
        assert!(turn.tool_results.is_empty());
        assert!(turn.assistant_content.is_none());
        assert!(turn.timestamp >= start && turn.timestamp <= end);
    }

    #[test]
    fn tool_invocation_pairing() {
        let calls = vec![
            ToolCall {
                call_id: "call_1".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({"query": "kubernetes pod"}),
            },
            ToolCall {
                call_id: "call_2".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({"query": "kubernetes service"}),
            },
        ];
        let results = vec![
            ToolCallResult {
                call_id: "call_1".to_string(),
                outcome: ToolResult::Success {
                    payload: json!([{"question": "q", "answer": "a", "score": 0.9}]),
                },
            },
            ToolCallResult {
                call_id: "call_2".to_string(),
                outcome: ToolResult::Failure {
                    kind: ToolFailureKind::Timeout,
                    message: "deadline exceeded".to_string(),
                },
            },
        ];

        let turn = Turn::tool_invocation(Some("Looking that up.".to_string()), calls, results);
        assert!(turn.is_paired());
        assert_eq!(turn.role, TurnRole::ToolInvocation);
        assert!(turn.content.is_empty());
    }

    #[test]
    fn pairing_detects_missing_and_duplicate_results() {
        let call = ToolCall {
            call_id: "call_1".to_string(),
            tool_name: "search".to_string(),
            arguments: json!({}),
        };
        let result = ToolCallResult {
            call_id: "call_1".to_string(),
            outcome: ToolResult::Success { payload: json!([]) },
        };

        let missing = Turn::tool_invocation(None, vec![call.clone()], vec![]);
        assert!(!missing.is_paired());

        let duplicated =
            Turn::tool_invocation(None, vec![call], vec![result.clone(), result.clone()]);
        assert!(!duplicated.is_paired());
    }

    #[test]
    fn turn_serde_round_trip() {
        let turn = Turn::tool_invocation(
            None,
            vec![ToolCall {
                call_id: "call_9".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({"query": "borrow checker"}),
            }],
            vec![ToolCallResult {
                call_id: "call_9".to_string(),
                outcome: ToolResult::Success {
                    payload: json!([{"question": "q", "answer": "a", "score": 0.4}]),
                },
            }],
        );

        let encoded = serde_json::to_string(&turn).unwrap();
        let decoded: Turn = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, turn);
    }
}
