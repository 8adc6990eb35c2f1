//! Agent turns that let a model call loaded tools.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use agent_adapters::{GenerationRequest, TextGenerator};
use agent_prompts::PromptLibrary;
use agent_tools::{ExecutionGuard, InvocationOutcome, LoadedToolset};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{TurnResult, join_names};

/// Default number of tool-call rounds per turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

const TURN_MAX_TOKENS: u32 = 2048;
const ROUNDS_EXHAUSTED_REPLY: &str =
    "I could not finish this request within the allowed number of tool calls.";

/// One tool call made during a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    /// Tool the model asked for.
    pub name: String,
    /// Arguments it supplied.
    pub arguments: Value,
    /// Message fed back to the model.
    pub result: String,
}

/// Final state of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text answer for the user.
    pub reply: String,
    /// Tool calls in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// True when the round limit cut the turn short.
    pub rounds_exhausted: bool,
}

#[derive(Deserialize)]
struct ToolCallEnvelope {
    tool_call: ToolCallRequest,
}

#[derive(Deserialize)]
struct ToolCallRequest {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Drives a model through tool calls until it answers in text.
///
/// Tool problems never abort a turn: missing credentials, failures and
/// unknown names are reported back to the model as tool messages.
#[derive(Clone)]
pub struct TurnExecutor {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
    guard: ExecutionGuard,
    max_rounds: usize,
}

impl fmt::Debug for TurnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnExecutor")
            .field("generator", &self.generator.label())
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

impl TurnExecutor {
    /// Creates an executor allowing [`DEFAULT_MAX_TOOL_ROUNDS`] rounds.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptLibrary>,
        guard: ExecutionGuard,
    ) -> Self {
        Self {
            generator,
            prompts,
            guard,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Sets the round limit.
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Runs one user turn against `toolset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TurnError`] when the model cannot be reached or the
    /// system prompt cannot be rendered.
    pub async fn run_turn(&self, toolset: &LoadedToolset, message: &str) -> TurnResult<TurnOutcome> {
        let system = self.prompts.turn_system(
            toolset.agent().and_then(|agent| agent.instruction()),
            &tool_listing(toolset),
        )?;
        let mut transcript = format!("User: {}\n", message.trim());
        let mut tool_calls = Vec::new();

        for round in 0..=self.max_rounds {
            let request = GenerationRequest::new(system.clone(), transcript.clone())
                .with_max_output_tokens(TURN_MAX_TOKENS);
            let reply = self.generator.generate_text(&request).await?;

            let Some(call) = parse_tool_call(&reply) else {
                return Ok(TurnOutcome {
                    reply: reply.trim().to_owned(),
                    tool_calls,
                    rounds_exhausted: false,
                });
            };
            if round == self.max_rounds {
                warn!(rounds = self.max_rounds, "tool-call limit reached");
                break;
            }

            let result = self.call_tool(toolset, &call).await;
            debug!(tool = %call.name, round, "tool call answered");
            let _ = writeln!(transcript, "Assistant: {}", reply.trim());
            let _ = writeln!(transcript, "Tool {}: {result}", call.name);
            tool_calls.push(ToolCallRecord {
                name: call.name,
                arguments: call.arguments,
                result,
            });
        }

        Ok(TurnOutcome {
            reply: ROUNDS_EXHAUSTED_REPLY.to_owned(),
            tool_calls,
            rounds_exhausted: true,
        })
    }

    async fn call_tool(&self, toolset: &LoadedToolset, call: &ToolCallRequest) -> String {
        let Some(handle) = toolset.registry().get(&call.name) else {
            return json!({ "error": format!("unknown tool `{}`", call.name) }).to_string();
        };
        match self.guard.execute(&handle, call.arguments.clone()).await {
            InvocationOutcome::Completed(value) => value.to_string(),
            InvocationOutcome::MissingCredentials(names) => {
                format!("Please add your [{}] in settings.", join_names(&names))
            }
            InvocationOutcome::Failed { reason } => json!({ "error": reason }).to_string(),
        }
    }
}

fn tool_listing(toolset: &LoadedToolset) -> String {
    toolset
        .registry()
        .list()
        .iter()
        .map(|tool| format!("- {}: {}", tool.id(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_tool_call(reply: &str) -> Option<ToolCallRequest> {
    let trimmed = reply.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    let envelope: ToolCallEnvelope = serde_json::from_str(trimmed.get(start..=end)?).ok()?;
    Some(envelope.tool_call)
}
