use contract_review_common::config::{LlmRoleConfig, RetryConfig};

use super::loader::{ConfigError, EngineConfig};
use crate::roles::ReviewRole;

/// Validate the complete engine configuration.
///
/// Checks sane ranges on numeric parameters and that every role has a
/// system prompt. Collects every problem before failing.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_llm(config, &mut errors);
    validate_retry(&config.system.retry.llm_api, "llm_api", &mut errors);
    validate_session(config, &mut errors);
    validate_knowledge(config, &mut errors);
    validate_prompts(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.join("; ")))
    }
}

fn validate_llm(config: &EngineConfig, errors: &mut Vec<String>) {
    for role in ReviewRole::ALL {
        validate_role(role.llm_config(&config.system.llm), role.id(), errors);
    }
}

fn validate_role(role: &LlmRoleConfig, name: &str, errors: &mut Vec<String>) {
    if role.provider.is_empty() {
        errors.push(format!("llm.{}.provider must not be empty", name));
    }
    if role.model.is_empty() {
        errors.push(format!("llm.{}.model must not be empty", name));
    }
    if role.max_tokens == 0 {
        errors.push(format!("llm.{}.max_tokens must be > 0", name));
    }
    if role.timeout_seconds == 0 {
        errors.push(format!("llm.{}.timeout_seconds must be > 0", name));
    }
    if let Some(temp) = role.temperature {
        if !(0.0..=2.0).contains(&temp) {
            errors.push(format!(
                "llm.{}.temperature must be between 0.0 and 2.0",
                name
            ));
        }
    }
}

fn validate_retry(rc: &RetryConfig, name: &str, errors: &mut Vec<String>) {
    if rc.max_attempts == 0 {
        errors.push(format!("retry.{}.max_attempts must be > 0", name));
    }
    if rc.initial_backoff_ms == 0 {
        errors.push(format!("retry.{}.initial_backoff_ms must be > 0", name));
    }
    if rc.max_backoff_ms < rc.initial_backoff_ms {
        errors.push(format!(
            "retry.{}.max_backoff_ms must be >= initial_backoff_ms",
            name
        ));
    }
    if rc.backoff_multiplier < 1.0 {
        errors.push(format!("retry.{}.backoff_multiplier must be >= 1.0", name));
    }
}

fn validate_session(config: &EngineConfig, errors: &mut Vec<String>) {
    let s = &config.system.session;

    if s.max_turns == 0 {
        errors.push("session.max_turns must be > 0".into());
    }
    if s.max_consecutive_malformed_tool_calls == 0 {
        errors.push("session.max_consecutive_malformed_tool_calls must be > 0".into());
    }
    if config.system.tool_results.max_document_chars == 0 {
        errors.push("tool_results.max_document_chars must be > 0".into());
    }
}

fn validate_knowledge(config: &EngineConfig, errors: &mut Vec<String>) {
    let k = &config.system.knowledge;

    if k.passage_chars < 200 {
        errors.push("knowledge.passage_chars must be >= 200".into());
    }
    if k.max_passages == 0 {
        errors.push("knowledge.max_passages must be > 0".into());
    }
}

fn validate_prompts(config: &EngineConfig, errors: &mut Vec<String>) {
    for role in ReviewRole::ALL {
        match config.prompts.get(role.id()) {
            Some(prompt) if !prompt.trim().is_empty() => {}
            Some(_) => errors.push(format!("prompts/{}.md must not be empty", role.id())),
            None => errors.push(format!("prompts/{}.md is missing", role.id())),
        }
    }
}
