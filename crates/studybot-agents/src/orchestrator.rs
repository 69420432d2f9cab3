use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use studybot_common::{Error, Result, SessionId, ToolCall, ToolCallResult, Turn};
use studybot_config::AppConfig;
use studybot_db::ContextStore;
use studybot_media::{AudioTurnAdapter, SpeechHttpClient, SynthesizedAudio, WhisperHttpClient};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::context::{trim_turns_to_budget, turns_to_messages};
use crate::openai::OpenAiCompatClient;
use crate::providers::{CompletionClient, CompletionRequest, CompletionResult};
use crate::tools::{KnowledgeSearchTool, RandomQuestionTool, ToolRegistry};

/// Hard bound on completion/tool exchanges within one user turn. The
/// completion service can request tools indefinitely; this cap is what
/// guarantees the loop terminates.
pub const MAX_TOOL_ROUNDS: usize = 5;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful study assistant specialized in \
answering questions and providing practice questions. You have two tools: 'search' finds \
question-answer pairs relevant to a query, and 'get_random_question' fetches a random \
practice question by difficulty and topic.\n\n\
Guidelines:\n\
- When the user asks a specific factual question, search the dataset first by calling \
'search' with the user's question as the query. If the dataset has the answer, use it.\n\
- When the user wants practice questions or to test their knowledge, ask them for a \
difficulty level (beginner, intermediate, advanced) and a topic before calling \
'get_random_question'; treat 'any' as an omitted argument.\n\
- Be conversational and helpful.";

const ROUND_LIMIT_FALLBACK: &str = "I'm sorry, I wasn't able to put together an answer \
after several lookups. Could you try rephrasing your question?";

const UPSTREAM_FALLBACK: &str = "I'm sorry, something went wrong while generating a \
response. Please try again in a moment.";

/// The reply produced by one orchestrator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub outcome: TurnOutcome,
}

/// Terminal state of the tool-calling loop for one user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The completion service produced a final answer.
    Completed,
    /// The round limit was hit; `text` carries the fallback reply.
    RoundLimited,
}

/// Reply for an audio turn: the recognized input, the text reply, and the
/// synthesized form when requested.
#[derive(Debug)]
pub struct AudioTurnReply {
    pub transcript: String,
    pub reply: TurnReply,
    pub audio: Option<SynthesizedAudio>,
}

/// Drives the completion/tool exchange for one user turn at a time and
/// commits the resulting turns to the context store.
///
/// One invocation processes one turn to completion. Rounds are strictly
/// sequential; independent tool calls within a round are dispatched
/// concurrently and merged by `call_id`. Nothing is committed until a
/// terminal state, and a commit always carries the user turn together
/// with its response so the transcript can never hold one without the
/// other.
pub struct Orchestrator {
    completion: Arc<dyn CompletionClient>,
    tools: ToolRegistry,
    store: Arc<Mutex<ContextStore>>,
    audio: Option<AudioTurnAdapter>,
    system_prompt: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    window_turns: usize,
    max_context_tokens: usize,
}

impl Orchestrator {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        tools: ToolRegistry,
        store: Arc<Mutex<ContextStore>>,
    ) -> Self {
        Self {
            completion,
            tools,
            store,
            audio: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: String::new(),
            max_tokens: None,
            temperature: None,
            window_turns: 20,
            max_context_tokens: 16_000,
        }
    }

    /// Wire up the full stack from configuration: OpenAI-compatible
    /// completion client, both dataset tools, and the audio adapter.
    pub fn from_config(config: &AppConfig, store: Arc<Mutex<ContextStore>>) -> Self {
        let completion = Arc::new(OpenAiCompatClient::new(
            config.completion.base_url.clone(),
            config.completion.api_key.clone(),
            Duration::from_secs(config.completion.timeout_secs),
        ));

        let tool_timeout = Duration::from_secs(config.tools.timeout_secs);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(KnowledgeSearchTool::new(
            config.tools.base_url.clone(),
            tool_timeout,
        )));
        tools.register(Arc::new(RandomQuestionTool::new(
            config.tools.base_url.clone(),
            tool_timeout,
        )));

        let audio_timeout = Duration::from_secs(config.audio.timeout_secs);
        let audio = AudioTurnAdapter::new(
            Arc::new(WhisperHttpClient::new(
                config.audio.stt_url.clone(),
                audio_timeout,
            )),
            Arc::new(SpeechHttpClient::new(
                config.audio.tts_url.clone(),
                audio_timeout,
            )),
            config.audio.max_duration_secs,
            config.audio.max_audio_bytes,
        );

        let mut orchestrator = Self::new(completion, tools, store);
        orchestrator.audio = Some(audio);
        orchestrator.model = config.completion.model.clone();
        orchestrator.max_tokens = config.completion.max_tokens;
        orchestrator.temperature = config.completion.temperature;
        orchestrator.window_turns = config.context.window_turns;
        orchestrator.max_context_tokens = config.context.max_context_tokens;
        if let Some(prompt) = &config.context.system_prompt {
            orchestrator.system_prompt = prompt.clone();
        }
        orchestrator
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn set_window_turns(&mut self, window_turns: usize) {
        self.window_turns = window_turns.max(1);
    }

    pub fn set_max_context_tokens(&mut self, max_context_tokens: usize) {
        self.max_context_tokens = max_context_tokens;
    }

    pub fn set_audio_adapter(&mut self, audio: AudioTurnAdapter) {
        self.audio = Some(audio);
    }

    /// Process one text turn to completion.
    ///
    /// Rejects unknown sessions before any processing. On success the
    /// user turn, any tool-invocation turns, and the assistant reply are
    /// committed in one transaction and the reply is returned. Hitting
    /// the round limit commits a fallback reply instead and reports
    /// `RoundLimited`. A completion-service failure commits the user turn
    /// together with an apology turn and surfaces the `Upstream` error.
    #[instrument(skip(self, user_text), fields(session_id = %session_id))]
    pub async fn process_turn(
        &self,
        session_id: &SessionId,
        user_text: &str,
    ) -> Result<TurnReply> {
        let window = {
            let store = self.store.lock().await;
            store.read_window(session_id, self.window_turns)?
        };

        let user_turn = Turn::user(user_text);
        let mut draft = window;
        draft.push(user_turn.clone());

        // Turns produced by this invocation, committed only at a terminal
        // state.
        let mut new_turns = vec![user_turn];

        let tool_schemas = self.tools.schemas();

        for round in 1..=MAX_TOOL_ROUNDS {
            trim_turns_to_budget(
                &mut draft,
                Some(&self.system_prompt),
                &tool_schemas,
                self.max_context_tokens,
            );

            let request = CompletionRequest {
                model: self.model.clone(),
                system: Some(self.system_prompt.clone()),
                messages: turns_to_messages(&draft),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                tools: tool_schemas.clone(),
            };

            let result = match self.completion.complete(&request).await {
                Ok(result) => result,
                Err(err @ Error::Upstream { .. }) => {
                    warn!("completion service failed on round {}: {}", round, err);
                    new_turns.push(Turn::assistant(UPSTREAM_FALLBACK));
                    self.commit(session_id, &new_turns).await?;
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            match result {
                CompletionResult::FinalAnswer { text } => {
                    new_turns.push(Turn::assistant(&text));
                    self.commit(session_id, &new_turns).await?;
                    return Ok(TurnReply {
                        text,
                        outcome: TurnOutcome::Completed,
                    });
                }
                CompletionResult::ToolCallRequest {
                    assistant_text,
                    calls,
                } => {
                    info!(
                        "round {}: completion requested {} tool call(s)",
                        round,
                        calls.len()
                    );
                    let results = self.execute_calls(&calls).await;
                    let invocation = Turn::tool_invocation(assistant_text, calls, results);
                    draft.push(invocation.clone());
                    new_turns.push(invocation);
                }
            }
        }

        warn!(
            "no final answer after {} rounds, replying with fallback",
            MAX_TOOL_ROUNDS
        );
        new_turns.push(Turn::assistant(ROUND_LIMIT_FALLBACK));
        self.commit(session_id, &new_turns).await?;
        Ok(TurnReply {
            text: ROUND_LIMIT_FALLBACK.to_string(),
            outcome: TurnOutcome::RoundLimited,
        })
    }

    /// Process one audio turn: recognize speech, run the text loop, and
    /// optionally synthesize the reply.
    ///
    /// Transcription failures are terminal before any session state
    /// changes. A synthesis failure is returned as-is; the text turns are
    /// already committed and remain valid.
    #[instrument(skip(self, audio), fields(session_id = %session_id, audio_bytes = audio.len()))]
    pub async fn process_audio_turn(
        &self,
        session_id: &SessionId,
        audio: &[u8],
        synthesize_reply: bool,
    ) -> Result<AudioTurnReply> {
        let adapter = self
            .audio
            .as_ref()
            .ok_or_else(|| Error::Agent("no audio adapter configured".to_string()))?;

        let transcript = adapter.speech_to_text(audio).await?;
        let reply = self.process_turn(session_id, &transcript.text).await?;

        let audio_reply = if synthesize_reply {
            Some(adapter.text_to_speech(&reply.text).await?)
        } else {
            None
        };

        Ok(AudioTurnReply {
            transcript: transcript.text,
            reply,
            audio: audio_reply,
        })
    }

    /// Dispatch every call in the round concurrently; the calls share no
    /// mutable state and results are merged by `call_id`, not arrival
    /// order. `join_all` preserves input order for the persisted record.
    async fn execute_calls(&self, calls: &[ToolCall]) -> Vec<ToolCallResult> {
        let pending = calls.iter().map(|call| async move {
            let outcome = self
                .tools
                .dispatch(&call.tool_name, call.arguments.clone())
                .await;
            if let studybot_common::ToolResult::Failure { kind, message } = &outcome {
                warn!(
                    "tool '{}' (call {}) failed ({kind}): {message}",
                    call.tool_name, call.call_id
                );
            }
            ToolCallResult {
                call_id: call.call_id.clone(),
                outcome,
            }
        });
        join_all(pending).await
    }

    async fn commit(&self, session_id: &SessionId, turns: &[Turn]) -> Result<()> {
        debug_assert!(turns
            .iter()
            .all(|turn| turn.role != studybot_common::TurnRole::ToolInvocation || turn.is_paired()));
        let mut store = self.store.lock().await;
        store.append_turns(session_id, turns)
    }
}
