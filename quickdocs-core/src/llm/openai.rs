use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::LlmError;
use super::anthropic::retry_after_hint;
use super::backend::{LlmBackend, ProviderRequest, ProviderResponse};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI Chat Completions backend with function-calling tools.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, api_key })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn call(&self, req: &ProviderRequest) -> Result<ProviderResponse, LlmError> {
        let mut messages = vec![json!({"role": "system", "content": req.system})];
        messages.push(json!({"role": "user", "content": req.user}));

        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
        });

        if !req.tools.is_empty() {
            let tools: Vec<serde_json::Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("required");
        }

        let resp = self
            .http
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::Throttled {
                retry_after: retry_after_hint(resp.headers()),
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(512).collect();
            return Err(LlmError::Api(format!(
                "OpenAI API returned {}: {snippet}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("decoding OpenAI response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(LlmError::Api(format!("OpenAI API error: {}", err.message)));
        }

        let usage = parsed.usage.unwrap_or(ChatUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });
        let mut out = ProviderResponse {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            ..ProviderResponse::default()
        };

        if let Some(choice) = parsed.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                out.text = content;
            }
            if let Some(call) = choice.message.tool_calls.into_iter().next() {
                // Function arguments arrive as a JSON string; a malformed one
                // is a structural failure, not a transient one.
                let input: serde_json::Value = serde_json::from_str(&call.function.arguments)
                    .map_err(|e| LlmError::Parse(format!("tool call arguments: {e}")))?;
                out.tool_input = Some(input);
            }
        }

        Ok(out)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
