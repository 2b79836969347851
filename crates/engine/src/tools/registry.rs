use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use serde_json::Value;

use contract_review_common::config::ToolResultLimits;

use crate::document::Document;
use crate::knowledge::KnowledgeBase;
use crate::llm::session::{ToolExecutionResult, ToolExecutor};
use crate::llm::types::ToolDefinition;

/// Shared context available to all tool handlers in one role session.
pub struct ToolHandlerContext {
    /// The contract under review, already extracted.
    pub document: Arc<Document>,
    /// Checklist knowledge (compliance role only).
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub tool_result_limits: ToolResultLimits,
    pub max_passages: usize,
    pub session_counters: SessionCounters,
}

/// Counters tracking tool use during a session.
#[derive(Default)]
pub struct SessionCounters {
    pub document_reads: AtomicU32,
    pub checklist_queries: AtomicU32,
}

/// Handler function signature: takes args and context, returns JSON or error string.
pub type ToolHandler = Arc<
    dyn Fn(
            Value,
            Arc<ToolHandlerContext>,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>
        + Send
        + Sync,
>;

struct Dispatcher {
    handlers: HashMap<String, ToolHandler>,
    context: Arc<ToolHandlerContext>,
}

impl Dispatcher {
    async fn dispatch(&self, name: &str, args: Value) -> ToolExecutionResult {
        let start = std::time::Instant::now();

        let Some(handler) = self.handlers.get(name) else {
            tracing::warn!(tool = %name, "Unknown tool called");
            metrics::counter!("tools.execution.errors", "tool" => name.to_string()).increment(1);
            let mut available: Vec<_> = self.handlers.keys().map(String::as_str).collect();
            available.sort_unstable();
            return ToolExecutionResult {
                content: format!(
                    "Unknown tool: '{}'. Available tools: {}",
                    name,
                    available.join(", ")
                ),
                is_error: true,
                is_malformed: true,
            };
        };

        let result = handler(args, Arc::clone(&self.context)).await;

        let latency = start.elapsed().as_secs_f64();
        metrics::histogram!("tools.execution.latency", "tool" => name.to_string()).record(latency);
        metrics::counter!("tools.execution.count", "tool" => name.to_string()).increment(1);

        match result {
            Ok(value) => {
                let content = serde_json::to_string(&value).unwrap_or_else(|e| {
                    format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
                });
                tracing::info!(
                    tool = %name,
                    latency_s = latency,
                    result_len = content.len(),
                    "Tool call succeeded"
                );
                ToolExecutionResult {
                    content,
                    is_error: false,
                    is_malformed: false,
                }
            }
            Err(msg) => {
                tracing::warn!(tool = %name, latency_s = latency, error = %msg, "Tool call failed");
                metrics::counter!("tools.execution.errors", "tool" => name.to_string())
                    .increment(1);
                // Argument deserialization failures mean the model sent bad input.
                let is_malformed = msg.starts_with("Invalid arguments");
                ToolExecutionResult {
                    content: msg,
                    is_error: true,
                    is_malformed,
                }
            }
        }
    }
}

/// Registry of tool handlers with their schema definitions.
pub struct ToolRegistry {
    handlers: HashMap<String, ToolHandler>,
    definitions: Vec<ToolDefinition>,
    context: Arc<ToolHandlerContext>,
}

impl ToolRegistry {
    pub fn new(context: ToolHandlerContext) -> Self {
        Self {
            handlers: HashMap::new(),
            definitions: Vec::new(),
            context: Arc::new(context),
        }
    }

    /// Register a tool handler by name.
    pub fn register(&mut self, name: &str, handler: ToolHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Load tool definitions for one role from the config-loaded schemas.
    ///
    /// Schemas are keyed "{role}/{tool}"; only keys under `role` are taken.
    pub fn load_definitions(
        &mut self,
        tool_schemas: &HashMap<String, Value>,
        role: &str,
    ) -> Result<(), String> {
        let prefix = format!("{}/", role);

        let mut keys: Vec<_> = tool_schemas
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .collect();
        keys.sort();

        for key in keys {
            let schema = &tool_schemas[key];
            let field = |name: &str| {
                schema
                    .get(name)
                    .ok_or_else(|| format!("Tool schema '{}' missing '{}' field", key, name))
            };

            let name = field("name")?
                .as_str()
                .ok_or_else(|| format!("Tool schema '{}' has a non-string name", key))?
                .to_string();
            let description = field("description")?.as_str().unwrap_or_default().to_string();
            let input_schema = field("input_schema")?.clone();

            if !self.handlers.contains_key(&name) {
                tracing::warn!(role = role, tool = %name, "Tool schema has no registered handler");
            }

            self.definitions.push(ToolDefinition {
                name,
                description,
                input_schema,
            });
        }

        tracing::info!(
            role = role,
            tools = self.definitions.len(),
            "Loaded tool definitions"
        );

        Ok(())
    }

    /// Tool definitions to send to the model.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.context.session_counters
    }

    fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher {
            handlers: self.handlers.clone(),
            context: Arc::clone(&self.context),
        })
    }

    /// Execute a tool call by name.
    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolExecutionResult {
        self.dispatcher().dispatch(tool_name, args).await
    }

    /// Create a ToolExecutor closure for use with `run_session`.
    pub fn as_executor(&self) -> ToolExecutor {
        let dispatcher = self.dispatcher();

        Box::new(move |name: String, args: Value| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move {
                tracing::info!(tool = %name, "Tool call started");
                dispatcher.dispatch(&name, args).await
            })
        })
    }
}
