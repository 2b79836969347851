use serde::{Deserialize, Serialize};

/// Top-level system configuration, deserialized from system.toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub llm: LlmConfig,
    pub retry: RetryDefaults,
    pub session: SessionLimits,
    pub knowledge: KnowledgeConfig,
    pub tool_results: ToolResultLimits,
}

impl SystemConfig {
    /// Parse a system.toml document.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// LLM provider and model configuration per analysis role.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    pub clause_extraction: LlmRoleConfig,
    pub risk_scoring: LlmRoleConfig,
    pub checklist_compliance: LlmRoleConfig,
}

/// Configuration for a single LLM role.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmRoleConfig {
    /// Provider name ("openai").
    pub provider: String,
    /// Model identifier (e.g. "gpt-4o-mini").
    pub model: String,
    /// Max tokens in the response.
    pub max_tokens: u32,
    /// Temperature (0.0–2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Wall-clock budget for the whole role session, retries included.
    #[serde(default = "default_role_timeout")]
    pub timeout_seconds: u64,
    /// Override for OpenAI-compatible gateways.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_role_timeout() -> u64 {
    300
}

/// Default retry parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub llm_api: RetryConfig,
}

/// Retry configuration for a specific target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

/// Limits on a single role's agentic session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Max LLM turns per role session.
    pub max_turns: u32,
    /// Consecutive malformed tool calls before ending the session.
    pub max_consecutive_malformed_tool_calls: u32,
}

/// Checklist knowledge base used by the compliance role.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the checklist guide, relative to the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_path: Option<String>,
    /// Max characters per retrieved passage.
    pub passage_chars: u32,
    /// Max passages returned per query.
    pub max_passages: u32,
}

/// Tool result size limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResultLimits {
    /// Max characters of contract text returned by get_document.
    pub max_document_chars: u32,
}
