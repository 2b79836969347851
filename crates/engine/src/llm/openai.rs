use serde::{Deserialize, Serialize};
use serde_json::Value;

use contract_review_common::config::LlmRoleConfig;

use super::types::{
    ContentBlock, LlmResponse, Message, Role, StopReason, TokenUsage, ToolDefinition,
};
use super::LlmError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Request wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    r#type: String,
    function: ChatToolCallFunction,
}

#[derive(Serialize, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    arguments: String,
}

// ---------------------------------------------------------------------------
// Response wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

impl ChatMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.into(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

fn to_wire_messages(system: &str, messages: &[Message]) -> Vec<ChatMessage> {
    let mut wire = vec![ChatMessage::text("system", system.to_string())];

    for msg in messages {
        match msg.role {
            // User turns carry either the prompt text or tool results.
            Role::User => wire.extend(msg.content.iter().filter_map(|block| match block {
                ContentBlock::Text { text } => Some(ChatMessage::text("user", text.clone())),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(ChatMessage {
                    tool_call_id: Some(tool_use_id.clone()),
                    ..ChatMessage::text("tool", content.clone())
                }),
                ContentBlock::ToolUse { .. } => None,
            })),
            Role::Assistant => {
                let mut text_parts = Vec::new();
                let mut tool_calls = Vec::new();

                for block in &msg.content {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.as_str()),
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_calls.push(ChatToolCall {
                                id: id.clone(),
                                r#type: "function".into(),
                                function: ChatToolCallFunction {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            });
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }

                wire.push(ChatMessage {
                    role: "assistant".into(),
                    content: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: None,
                });
            }
        }
    }

    wire
}

fn to_wire_tools(tools: &[ToolDefinition]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|t| ChatTool {
            r#type: "function".into(),
            function: ChatFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

fn from_wire_response(resp: ChatResponse) -> Result<LlmResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Parse("Empty choices array".into()))?;

    let mut content = Vec::new();

    if let Some(text) = choice.message.content {
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
    }

    for tc in choice.message.tool_calls {
        let input: Value = serde_json::from_str(&tc.function.arguments)
            .unwrap_or(Value::Object(serde_json::Map::new()));
        content.push(ContentBlock::ToolUse {
            id: tc.id,
            name: tc.function.name,
            input,
        });
    }

    let stop_reason = match choice.finish_reason.as_str() {
        "stop" => StopReason::EndTurn,
        "tool_calls" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    };

    Ok(LlmResponse {
        content,
        stop_reason,
        usage: TokenUsage {
            input_tokens: resp.usage.prompt_tokens,
            output_tokens: resp.usage.completion_tokens,
        },
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Send one chat completion request to an OpenAI-compatible endpoint.
pub async fn send_chat_completion(
    http: &reqwest::Client,
    api_key: &str,
    config: &LlmRoleConfig,
    system: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
) -> Result<LlmResponse, LlmError> {
    let start = std::time::Instant::now();
    let model = config.model.as_str();

    let request = ChatRequest {
        model,
        max_tokens: config.max_tokens,
        messages: to_wire_messages(system, messages),
        tools: to_wire_tools(tools),
        temperature: config.temperature,
    };

    let base_url = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(e.to_string())
            } else {
                LlmError::Http(e.to_string())
            }
        })?;

    let status = response.status();
    metrics::histogram!("llm.api.latency", "model" => model.to_string())
        .record(start.elapsed().as_secs_f64());

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Auth(format!("{}: {}", status, body)));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if status == reqwest::StatusCode::GATEWAY_TIMEOUT
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
    {
        return Err(LlmError::Timeout(status.to_string()));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let msg = match serde_json::from_str::<OpenAiError>(&body) {
            Ok(e) if e.error.message.contains("context_length_exceeded") => {
                return Err(LlmError::ContextWindowExceeded(e.error.message));
            }
            Ok(e) => e.error.message,
            Err(_) => body,
        };
        return Err(LlmError::Api(format!("{}: {}", status, msg)));
    }

    let body: ChatResponse = response
        .json()
        .await
        .map_err(|e| LlmError::Parse(format!("Failed to parse chat response: {}", e)))?;

    let llm_response = from_wire_response(body)?;

    metrics::counter!("llm.api.input_tokens", "model" => model.to_string())
        .increment(llm_response.usage.input_tokens);
    metrics::counter!("llm.api.output_tokens", "model" => model.to_string())
        .increment(llm_response.usage.output_tokens);

    Ok(llm_response)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_final_json_answer() {
        let body = r#"{
            "choices": [{
                "message": {"content": "{\"findings\": []}", "tool_calls": []},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 40}
        }"#;

        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let parsed = from_wire_response(resp).unwrap();

        assert_eq!(parsed.stop_reason, StopReason::EndTurn);
        assert_eq!(parsed.usage.input_tokens, 1200);
        assert_eq!(parsed.text(), r#"{"findings": []}"#);
    }

    #[test]
    fn test_parse_get_document_call() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_doc",
                        "type": "function",
                        "function": {"name": "get_document", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 300, "completion_tokens": 12}
        }"#;

        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let parsed = from_wire_response(resp).unwrap();

        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
        let calls = parsed.tool_uses();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "call_doc");
        assert_eq!(calls[0].1, "get_document");
    }

    #[test]
    fn test_unparseable_arguments_become_empty_object() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search_checklist", "arguments": "{not json"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }"#;

        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let parsed = from_wire_response(resp).unwrap();
        assert_eq!(parsed.tool_uses()[0].2, json!({}));
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices": [], "usage": {"prompt_tokens": 0, "completion_tokens": 0}}"#)
                .unwrap();
        assert!(matches!(from_wire_response(resp), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_tool_round_trip_in_wire_format() {
        let messages = vec![
            Message::user_text("Review the contract."),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "call_doc".into(),
                    name: "get_document".into(),
                    input: json!({}),
                }],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "call_doc".into(),
                    content: r#"{"filename": "nda.pdf"}"#.into(),
                    is_error: None,
                }],
            },
        ];

        let wire = to_wire_messages("You are a contract reviewer.", &messages);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
        assert!(wire[2].content.is_none());
        assert_eq!(wire[2].tool_calls.as_ref().unwrap()[0].function.arguments, "{}");
        assert_eq!(wire[3].role, "tool");
        assert_eq!(wire[3].tool_call_id.as_deref(), Some("call_doc"));
    }

    #[test]
    fn test_tools_serialized_as_functions() {
        let tools = vec![ToolDefinition {
            name: "get_document".into(),
            description: "Fetch the contract text".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }];
        let wire = serde_json::to_value(to_wire_tools(&tools)).unwrap();
        assert_eq!(wire[0]["type"], "function");
        assert_eq!(wire[0]["function"]["name"], "get_document");
    }
}
