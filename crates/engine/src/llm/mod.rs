mod openai;
pub mod session;
pub mod types;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use contract_review_common::config::{LlmRoleConfig, RetryConfig};

pub use types::{ContentBlock, LlmResponse, Message, Role, StopReason, TokenUsage, ToolDefinition};

/// Chat client for one role's model, with retry and backoff.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmRoleConfig,
    retry_config: RetryConfig,
    api_key: String,
}

/// Errors from model API calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM HTTP error: {0}")]
    Http(String),

    #[error("LLM request timed out: {0}")]
    Timeout(String),

    #[error("LLM auth error: {0}")]
    Auth(String),

    #[error("LLM rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("LLM context window exceeded: {0}")]
    ContextWindowExceeded(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether this error should not be retried.
    fn is_non_retryable(&self) -> bool {
        matches!(self, LlmError::Auth(_) | LlmError::ContextWindowExceeded(_))
    }
}

impl From<LlmError> for contract_review_common::ReviewError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout(_) => contract_review_common::ReviewError::ModelTimeout(e.to_string()),
            _ => contract_review_common::ReviewError::ModelUnavailable(e.to_string()),
        }
    }
}

/// Environment variable holding the API key for a provider.
pub fn api_key_env_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

impl LlmClient {
    /// Create a client for one role.
    /// Returns None if the provider is unknown or its API key is not set.
    pub fn new(config: LlmRoleConfig, retry_config: RetryConfig) -> Option<Self> {
        let Some(env_var) = api_key_env_var(&config.provider) else {
            tracing::warn!(provider = %config.provider, "Unknown LLM provider");
            return None;
        };

        let api_key = match std::env::var(env_var) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    env_var = env_var,
                    provider = config.provider.as_str(),
                    "API key not set, LLM client disabled for this role"
                );
                return None;
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Some(Self {
            http,
            config,
            retry_config,
            api_key,
        })
    }

    /// Send a chat request with retry logic.
    pub async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0u32;
        let mut backoff_ms = self.retry_config.initial_backoff_ms;

        loop {
            attempt += 1;
            let result = openai::send_chat_completion(
                &self.http,
                &self.api_key,
                &self.config,
                system,
                messages,
                tools,
            )
            .await;

            let err = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if err.is_non_retryable() || attempt >= self.retry_config.max_attempts {
                metrics::counter!("llm.api.errors", "model" => self.config.model.clone())
                    .increment(1);
                return Err(err);
            }

            let wait = match &err {
                LlmError::RateLimited {
                    retry_after: Some(secs),
                } => secs * 1000,
                _ if self.retry_config.jitter => backoff_ms + compute_jitter(attempt, backoff_ms),
                _ => backoff_ms,
            };
            tracing::warn!(attempt, wait_ms = wait, error = %err, "LLM call failed, retrying");
            tokio::time::sleep(Duration::from_millis(wait)).await;

            backoff_ms = (backoff_ms as f64 * self.retry_config.backoff_multiplier) as u64;
            backoff_ms = backoff_ms.min(self.retry_config.max_backoff_ms);
        }
    }
}

/// Jitter in [0, backoff_ms / 2] from a hash of the attempt and clock.
fn compute_jitter(attempt: u32, backoff_ms: u64) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::hash::DefaultHasher::new();
    attempt.hash(&mut hasher);
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        .hash(&mut hasher);
    hasher.finish() % (backoff_ms / 2 + 1)
}

/// Object-safe chat interface so role sessions can run against a mock model.
pub trait LlmCaller: Send + Sync {
    fn chat<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>>;
}

impl LlmCaller for LlmClient {
    fn chat<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.chat(system, messages, tools))
    }
}
