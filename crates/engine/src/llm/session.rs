use std::future::Future;
use std::pin::Pin;

use super::types::{ContentBlock, Message, Role, ToolDefinition};
use super::{LlmCaller, LlmError};

/// How an agentic session ended.
pub enum SessionResult {
    /// The model answered with text only; `final_text` is its answer.
    Completed {
        final_text: String,
        stats: SessionStats,
    },
    /// Hit the configured max turns limit.
    MaxTurnsReached { stats: SessionStats },
    /// Too many consecutive malformed tool calls.
    MalformedToolCallLimit { stats: SessionStats },
    /// The model API failed after retries.
    Failed { error: LlmError, stats: SessionStats },
}

impl SessionResult {
    pub fn stats(&self) -> &SessionStats {
        match self {
            Self::Completed { stats, .. }
            | Self::MaxTurnsReached { stats }
            | Self::MalformedToolCallLimit { stats }
            | Self::Failed { stats, .. } => stats,
        }
    }
}

/// Accumulated statistics for a session.
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub turns: u32,
    pub tool_calls: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub malformed_tool_calls: u32,
}

/// Limits for the agentic loop.
pub struct SessionConfig {
    pub max_turns: u32,
    pub max_consecutive_malformed: u32,
}

/// Result from executing a single tool call.
pub struct ToolExecutionResult {
    pub content: String,
    pub is_error: bool,
    /// Only malformed calls count toward the consecutive limit.
    pub is_malformed: bool,
}

/// Closure type for the tool executor passed to `run_session`.
pub type ToolExecutor = Box<
    dyn Fn(String, serde_json::Value) -> Pin<Box<dyn Future<Output = ToolExecutionResult> + Send>>
        + Send
        + Sync,
>;

/// Run the tool-use loop until the model answers without calling a tool.
///
/// Every review role runs through this loop; roles differ only in system
/// prompt and registered tools.
pub async fn run_session(
    llm: &dyn LlmCaller,
    system_prompt: &str,
    initial_user_message: &str,
    tools: &[ToolDefinition],
    tool_executor: &ToolExecutor,
    config: &SessionConfig,
) -> SessionResult {
    let mut history = vec![Message::user_text(initial_user_message)];
    let mut stats = SessionStats::default();
    let mut consecutive_malformed: u32 = 0;

    loop {
        if stats.turns >= config.max_turns {
            tracing::warn!(turns = stats.turns, "Session hit max turns limit");
            return SessionResult::MaxTurnsReached { stats };
        }
        stats.turns += 1;

        let response = match llm.chat(system_prompt, &history, tools).await {
            Ok(r) => r,
            Err(error) => {
                tracing::error!(error = %error, turn = stats.turns, "LLM API error during session");
                return SessionResult::Failed { error, stats };
            }
        };

        stats.total_input_tokens += response.usage.input_tokens;
        stats.total_output_tokens += response.usage.output_tokens;

        let tool_uses = response.tool_uses();
        if tool_uses.is_empty() {
            return SessionResult::Completed {
                final_text: response.text(),
                stats,
            };
        }

        history.push(Message {
            role: Role::Assistant,
            content: response.content,
        });

        let mut tool_results = Vec::with_capacity(tool_uses.len());
        for (id, name, input) in tool_uses {
            stats.tool_calls += 1;
            let result = tool_executor(name, input).await;

            if result.is_malformed {
                consecutive_malformed += 1;
                stats.malformed_tool_calls += 1;
            } else {
                consecutive_malformed = 0;
            }

            tool_results.push(ContentBlock::ToolResult {
                tool_use_id: id,
                content: result.content,
                is_error: result.is_error.then_some(true),
            });
        }

        if consecutive_malformed >= config.max_consecutive_malformed {
            tracing::warn!(
                consecutive = consecutive_malformed,
                "Session hit malformed tool call limit"
            );
            return SessionResult::MalformedToolCallLimit { stats };
        }

        history.push(Message {
            role: Role::User,
            content: tool_results,
        });
    }
}
