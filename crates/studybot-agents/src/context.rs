use studybot_common::{ToolResult, Turn, TurnRole};

use crate::providers::{ChatMessage, ToolSchema};

/// Rebuild the wire message list from a window of persisted turns.
///
/// A tool-invocation turn expands to the assistant's tool-call request
/// followed by one tool message per result, in call order, so the
/// completion service always sees a causally complete exchange.
pub fn turns_to_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len());
    for turn in turns {
        match turn.role {
            TurnRole::User => messages.push(ChatMessage::user(turn.content.clone())),
            TurnRole::Assistant => messages.push(ChatMessage::assistant(turn.content.clone())),
            TurnRole::ToolInvocation => {
                messages.push(ChatMessage::assistant_tool_calls(
                    turn.assistant_content.clone(),
                    turn.tool_calls.clone(),
                ));
                for result in &turn.tool_results {
                    messages.push(ChatMessage::tool_result(
                        result.call_id.clone(),
                        render_tool_result(&result.outcome),
                    ));
                }
            }
        }
    }
    messages
}

/// Tool output as the model sees it: the success payload verbatim, or a
/// structured error it can react to (apologize, answer without the tool).
pub fn render_tool_result(outcome: &ToolResult) -> String {
    match outcome {
        ToolResult::Success { payload } => payload.to_string(),
        ToolResult::Failure { kind, message } => serde_json::json!({
            "error": { "kind": kind, "message": message }
        })
        .to_string(),
    }
}

/// Rough token estimate: ~4 characters per token.
pub fn estimate_tokens(turns: &[Turn], system: Option<&str>, tools: &[ToolSchema]) -> usize {
    let mut chars = system.map_or(0, str::len);
    for turn in turns {
        chars += turn.content.len();
        if let Some(text) = &turn.assistant_content {
            chars += text.len();
        }
        for call in &turn.tool_calls {
            chars += call.tool_name.len() + call.arguments.to_string().len();
        }
        for result in &turn.tool_results {
            chars += render_tool_result(&result.outcome).len();
        }
    }
    for tool in tools {
        chars += tool.description.len() + tool.parameters.to_string().len();
    }
    chars / 4
}

/// Drop the oldest turns until the estimate fits the budget.
///
/// Truncation happens at whole-turn granularity only: a tool-invocation
/// turn leaves the window with all of its calls and results or not at
/// all, so the replayed exchange stays paired. The newest turn (the
/// current user input) is always kept.
pub fn trim_turns_to_budget(
    turns: &mut Vec<Turn>,
    system: Option<&str>,
    tools: &[ToolSchema],
    max_tokens: usize,
) {
    while turns.len() > 1 && estimate_tokens(turns, system, tools) > max_tokens {
        turns.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatRole;
    use serde_json::json;
    use studybot_common::{ToolCall, ToolCallResult, ToolFailureKind};

    fn invocation_turn() -> Turn {
        Turn::tool_invocation(
            Some("Searching.".to_string()),
            vec![
                ToolCall {
                    call_id: "call_1".to_string(),
                    tool_name: "search".to_string(),
                    arguments: json!({"query": "pods"}),
                },
                ToolCall {
                    call_id: "call_2".to_string(),
                    tool_name: "search".to_string(),
                    arguments: json!({"query": "services"}),
                },
            ],
            vec![
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
            ],
        )
    }

    #[test]
    fn tool_invocation_expands_to_request_plus_results() {
        let turns = vec![
            Turn::user("what is a pod?"),
            invocation_turn(),
            Turn::assistant("A pod is..."),
        ];

        let messages = turns_to_messages(&turns);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].tool_calls.len(), 2);
        assert_eq!(messages[2].role, ChatRole::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_2"));
        assert_eq!(messages[4].role, ChatRole::Assistant);
    }

    #[test]
    fn failure_results_render_as_error_payloads() {
        let rendered = render_tool_result(&ToolResult::Failure {
            kind: ToolFailureKind::RemoteError,
            message: "boom".to_string(),
        });
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["error"]["kind"], "remote_error");
        assert_eq!(value["error"]["message"], "boom");
    }

    #[test]
    fn trim_drops_oldest_whole_turns() {
        let long = "x".repeat(4000); // ~1000 tokens
        let mut turns = vec![
            Turn::assistant(&long),
            invocation_turn(),
            Turn::user("latest question"),
        ];

        trim_turns_to_budget(&mut turns, None, &[], 200);

        // Oldest turns dropped first; the invocation either left whole or
        // stayed whole.
        assert!(!turns.is_empty());
        assert_eq!(turns.last().unwrap().content, "latest question");
        for turn in &turns {
            if turn.role == TurnRole::ToolInvocation {
                assert!(turn.is_paired());
            }
        }
    }

    #[test]
    fn trim_always_keeps_newest_turn() {
        let long = "y".repeat(40_000);
        let mut turns = vec![Turn::user(&long)];
        trim_turns_to_budget(&mut turns, None, &[], 10);
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn trim_is_a_no_op_under_budget() {
        let mut turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        trim_turns_to_budget(&mut turns, Some("system"), &[], 100_000);
        assert_eq!(turns.len(), 2);
    }
}
