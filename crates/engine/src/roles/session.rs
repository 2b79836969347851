use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contract_review_common::config::{SessionLimits, ToolResultLimits};
use serde_json::Value;

use super::{ReviewRole, RoleError, RoleFuture, RoleInvoker, RoleReport, RoleRequest};
use crate::config::EngineConfig;
use crate::knowledge::KnowledgeBase;
use crate::llm::session::{run_session, SessionConfig, SessionResult};
use crate::llm::{LlmCaller, LlmClient, LlmError};
use crate::tools::handlers::register_role_tools;
use crate::tools::{ToolHandlerContext, ToolRegistry};

struct RoleSetup {
    /// None when the provider is unknown or its API key is missing.
    llm: Option<Arc<dyn LlmCaller>>,
    system_prompt: String,
    timeout: Duration,
}

/// Runs each role as a tool-use session against its configured model.
pub struct LlmRoleInvoker {
    roles: HashMap<ReviewRole, RoleSetup>,
    tool_schemas: HashMap<String, Value>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    tool_result_limits: ToolResultLimits,
    max_passages: usize,
    session_limits: SessionLimits,
}

impl LlmRoleInvoker {
    /// Build an invoker from the loaded configuration.
    ///
    /// Roles whose model client cannot be created are kept and fail with
    /// `ModelUnavailable` when invoked, so the review degrades instead of aborting.
    pub fn from_config(config: &EngineConfig, knowledge: Option<Arc<dyn KnowledgeBase>>) -> Self {
        let roles = ReviewRole::ALL
            .into_iter()
            .map(|role| {
                let llm_config = role.llm_config(&config.system.llm);
                let llm = LlmClient::new(llm_config.clone(), config.system.retry.llm_api.clone())
                    .map(|client| Arc::new(client) as Arc<dyn LlmCaller>);
                let setup = RoleSetup {
                    llm,
                    system_prompt: config.prompts.get(role.id()).cloned().unwrap_or_default(),
                    timeout: Duration::from_secs(llm_config.timeout_seconds),
                };
                (role, setup)
            })
            .collect();

        Self {
            roles,
            tool_schemas: config.tool_schemas.clone(),
            knowledge,
            tool_result_limits: config.system.tool_results.clone(),
            max_passages: config.system.knowledge.max_passages as usize,
            session_limits: config.system.session.clone(),
        }
    }

    /// Use a different model for one role.
    pub fn with_caller(mut self, role: ReviewRole, llm: Arc<dyn LlmCaller>) -> Self {
        if let Some(setup) = self.roles.get_mut(&role) {
            setup.llm = Some(llm);
        }
        self
    }

    /// Override the session time budget for one role.
    pub fn with_timeout(mut self, role: ReviewRole, timeout: Duration) -> Self {
        if let Some(setup) = self.roles.get_mut(&role) {
            setup.timeout = timeout;
        }
        self
    }

    async fn run(&self, role: ReviewRole, request: &RoleRequest) -> Result<RoleReport, RoleError> {
        let setup = self.roles.get(&role).ok_or_else(|| {
            RoleError::ModelUnavailable(format!("role {} is not configured", role.id()))
        })?;
        let llm = setup.llm.as_ref().ok_or_else(|| {
            RoleError::ModelUnavailable(format!(
                "no model client for {} (unknown provider or API key not set)",
                role.id()
            ))
        })?;

        let knowledge = match role {
            ReviewRole::ChecklistCompliance => self.knowledge.clone(),
            _ => None,
        };
        let context = ToolHandlerContext {
            document: Arc::clone(&request.document),
            knowledge,
            tool_result_limits: self.tool_result_limits.clone(),
            max_passages: self.max_passages,
            session_counters: Default::default(),
        };

        let mut registry = ToolRegistry::new(context);
        register_role_tools(&mut registry, role);
        registry
            .load_definitions(&self.tool_schemas, role.id())
            .map_err(RoleError::ModelUnavailable)?;

        let session_config = SessionConfig {
            max_turns: self.session_limits.max_turns,
            max_consecutive_malformed: self.session_limits.max_consecutive_malformed_tool_calls,
        };
        let executor = registry.as_executor();
        let message = initial_message(role, request);

        let start = Instant::now();
        let session = tokio::time::timeout(
            setup.timeout,
            run_session(
                llm.as_ref(),
                &setup.system_prompt,
                &message,
                registry.definitions(),
                &executor,
                &session_config,
            ),
        )
        .await;
        let duration = start.elapsed().as_secs_f64();

        let (turns, tool_calls) = match &session {
            Ok(result) => (result.stats().turns, result.stats().tool_calls),
            Err(_) => (0, 0),
        };

        let result = match session {
            Err(_) => Err(RoleError::ModelTimeout(format!(
                "{} did not finish within {}s",
                role.id(),
                setup.timeout.as_secs_f64()
            ))),
            Ok(SessionResult::Completed { final_text, .. }) => RoleReport::parse(&final_text),
            Ok(SessionResult::Failed {
                error: LlmError::Timeout(msg),
                ..
            }) => Err(RoleError::ModelTimeout(msg)),
            Ok(SessionResult::Failed { error, .. }) => {
                Err(RoleError::ModelUnavailable(error.to_string()))
            }
            Ok(SessionResult::MaxTurnsReached { stats }) => Err(RoleError::MalformedOutput(
                format!("no final answer after {} turns", stats.turns),
            )),
            Ok(SessionResult::MalformedToolCallLimit { stats }) => {
                Err(RoleError::MalformedOutput(format!(
                    "session ended after {} malformed tool calls",
                    stats.malformed_tool_calls
                )))
            }
        };

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) => e.kind(),
        };
        metrics::histogram!("role.session.duration", "role" => role.id()).record(duration);
        metrics::histogram!("role.session.tool_calls", "role" => role.id())
            .record(tool_calls as f64);
        metrics::counter!("role.session.outcome", "role" => role.id(), "outcome" => outcome)
            .increment(1);

        let counters = registry.counters();
        match &result {
            Ok(report) => tracing::info!(
                role = role.id(),
                duration_s = duration,
                turns,
                tool_calls,
                document_reads = counters.document_reads.load(Ordering::Relaxed),
                checklist_queries = counters.checklist_queries.load(Ordering::Relaxed),
                findings = report.findings.len(),
                "Role session completed"
            ),
            Err(e) => tracing::warn!(
                role = role.id(),
                duration_s = duration,
                turns,
                tool_calls,
                outcome,
                error = %e,
                "Role session produced no report"
            ),
        }

        result
    }
}

impl RoleInvoker for LlmRoleInvoker {
    fn invoke_role<'a>(&'a self, role: ReviewRole, request: &'a RoleRequest) -> RoleFuture<'a> {
        Box::pin(self.run(role, request))
    }
}

/// First user message of a role session: which document, which dimension,
/// and the reviewer's profile when one was given.
fn initial_message(role: ReviewRole, request: &RoleRequest) -> String {
    let mut message = format!(
        "Review the contract \"{}\" for the {} dimension. \
        Read it with the get_document tool, then answer with a single JSON object.",
        request.document.filename,
        role.label()
    );

    if !request.user_context.is_empty() {
        let profile = serde_json::to_string_pretty(&request.user_context).unwrap_or_default();
        message.push_str(
            "\n\nReviewer profile (adjust tone and emphasis of recommendations to it):\n",
        );
        message.push_str(&profile);
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    use contract_review_common::config::SystemConfig;
    use contract_review_common::types::UserContext;
    use serde_json::json;

    use crate::document::Document;
    use crate::llm::session::tests::{text_response, tool_response, ScriptedLlm};
    use crate::llm::types::{Message, ToolDefinition};
    use crate::llm::LlmResponse;

    fn system_toml(provider: &str) -> String {
        let role = format!(
            "provider = \"{}\"\nmodel = \"gpt-4o-mini\"\nmax_tokens = 2048\n",
            provider
        );
        format!(
            "[llm.clause_extraction]\n{role}\n[llm.risk_scoring]\n{role}\n[llm.checklist_compliance]\n{role}\n\
            [retry.llm_api]\nmax_attempts = 1\ninitial_backoff_ms = 10\nmax_backoff_ms = 10\nbackoff_multiplier = 1.0\njitter = false\n\
            [session]\nmax_turns = 4\nmax_consecutive_malformed_tool_calls = 2\n\
            [knowledge]\npassage_chars = 400\nmax_passages = 3\n\
            [tool_results]\nmax_document_chars = 5000\n"
        )
    }

    fn engine_config(provider: &str) -> EngineConfig {
        let mut tool_schemas = HashMap::new();
        for role in ReviewRole::ALL {
            tool_schemas.insert(
                format!("{}/get_document", role.id()),
                json!({
                    "name": "get_document",
                    "description": "Read the contract under review.",
                    "input_schema": {"type": "object", "properties": {}}
                }),
            );
        }
        let prompts = ReviewRole::ALL
            .iter()
            .map(|r| (r.id().to_string(), format!("You are the {} analyst.", r.label())))
            .collect();

        EngineConfig {
            system: SystemConfig::from_toml_str(&system_toml(provider)).unwrap(),
            tool_schemas,
            prompts,
            config_dir: std::path::PathBuf::from("config"),
        }
    }

    fn request() -> RoleRequest {
        RoleRequest {
            document: Arc::new(Document {
                content: "7. Indemnification. Vendor shall indemnify Client without limit.".into(),
                filename: "msa.pdf".into(),
            }),
            user_context: UserContext {
                job_title: Some("General Counsel".into()),
                ..Default::default()
            },
        }
    }

    /// Model that never answers.
    struct StalledLlm;

    impl LlmCaller for StalledLlm {
        fn chat<'a>(
            &'a self,
            _system: &'a str,
            _messages: &'a [Message],
            _tools: &'a [ToolDefinition],
        ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
            Box::pin(std::future::pending())
        }
    }

    fn invoker_with(role: ReviewRole, llm: impl LlmCaller + 'static) -> LlmRoleInvoker {
        LlmRoleInvoker::from_config(&engine_config("openai"), None).with_caller(role, Arc::new(llm))
    }

    #[tokio::test]
    async fn test_role_reads_document_then_reports() {
        let llm = ScriptedLlm::new(vec![
            Ok(tool_response("call_1", "get_document", json!({}))),
            Ok(text_response(
                r#"```json
{"findings": [{"clause_title": "Indemnification", "risk_level": "high", "reason": "Uncapped"}],
 "recommendations": ["Cap indemnity"]}
```"#,
            )),
        ]);
        let invoker = invoker_with(ReviewRole::RiskScoring, llm);

        let report = invoker
            .invoke_role(ReviewRole::RiskScoring, &request())
            .await
            .unwrap();

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.recommendations, vec!["Cap indemnity"]);
    }

    #[tokio::test]
    async fn test_prose_answer_is_malformed_output() {
        let llm = ScriptedLlm::new(vec![Ok(text_response("The contract looks fine to me."))]);
        let invoker = invoker_with(ReviewRole::ClauseExtraction, llm);

        let err = invoker
            .invoke_role(ReviewRole::ClauseExtraction, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_api_failure_is_unavailable() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::Auth("bad key".into()))]);
        let invoker = invoker_with(ReviewRole::ChecklistCompliance, llm);

        let err = invoker
            .invoke_role(ReviewRole::ChecklistCompliance, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_api_timeout_keeps_timeout_kind() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::Timeout("504".into()))]);
        let invoker = invoker_with(ReviewRole::RiskScoring, llm);

        let err = invoker
            .invoke_role(ReviewRole::RiskScoring, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::ModelTimeout(_)));
    }

    #[tokio::test]
    async fn test_stalled_model_hits_role_timeout() {
        let invoker = invoker_with(ReviewRole::RiskScoring, StalledLlm)
            .with_timeout(ReviewRole::RiskScoring, Duration::from_millis(20));

        let err = invoker
            .invoke_role(ReviewRole::RiskScoring, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::ModelTimeout(_)));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unavailable() {
        let invoker = LlmRoleInvoker::from_config(&engine_config("local"), None);

        let err = invoker
            .invoke_role(ReviewRole::ClauseExtraction, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::ModelUnavailable(_)));
    }

    #[test]
    fn test_initial_message_carries_profile() {
        let message = initial_message(ReviewRole::RiskScoring, &request());
        assert!(message.contains("msa.pdf"));
        assert!(message.contains("Risk Scoring"));
        assert!(message.contains("General Counsel"));

        let bare = RoleRequest {
            user_context: UserContext::default(),
            ..request()
        };
        assert!(!initial_message(ReviewRole::RiskScoring, &bare).contains("profile"));
    }
}
