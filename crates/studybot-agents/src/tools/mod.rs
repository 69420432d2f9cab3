use std::sync::Arc;

use async_trait::async_trait;
use studybot_common::{ToolFailureKind, ToolResult};
use tracing::warn;

use crate::providers::ToolSchema;

pub mod search;

pub use search::{KnowledgeSearchTool, RandomQuestionTool};

/// A capability the completion service can invoke by name.
///
/// `invoke` never fails at the `Result` level: every failure is encoded as
/// `ToolResult::Failure` so the orchestrator can hand it back to the model
/// as the tool result instead of aborting the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> serde_json::Value;

    async fn invoke(&self, arguments: serde_json::Value) -> ToolResult;
}

/// Ordered set of registered tools, looked up by name at dispatch time.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        tracing::info!("registered tool: {}", tool.name());
        self.tools.push(tool);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations for the completion request, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect()
    }

    /// Run a named tool. An unknown name is a `NotFound` failure payload,
    /// not an error: the model sees it and can correct itself.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        match self.find(name) {
            Some(tool) => tool.invoke(arguments).await,
            None => {
                warn!("completion service requested unknown tool '{}'", name);
                ToolResult::Failure {
                    kind: ToolFailureKind::NotFound,
                    message: format!("unknown tool: {name}"),
                }
            }
        }
    }
}
