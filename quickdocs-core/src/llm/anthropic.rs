use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::LlmError;
use super::backend::{LlmBackend, ProviderRequest, ProviderResponse};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic Messages API backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { input: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, api_key })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn call(&self, req: &ProviderRequest) -> Result<ProviderResponse, LlmError> {
        let mut body = json!({
            "model": req.model,
            "max_tokens": req.max_tokens,
            "system": [{"type": "text", "text": req.system}],
            "messages": [{"role": "user", "content": req.user}],
        });

        if !req.tools.is_empty() {
            let tools: Vec<serde_json::Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!({"type": "any"});
        }

        let resp = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
                "Anthropic API returned {}: {snippet}",
                status.as_u16()
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("decoding Anthropic response: {e}")))?;

        let mut out = ProviderResponse {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            ..ProviderResponse::default()
        };
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => out.text.push_str(&text),
                ContentBlock::ToolUse { input } => {
                    if out.tool_input.is_none() {
                        out.tool_input = Some(input);
                    }
                }
                ContentBlock::Other => {}
            }
        }

        Ok(out)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

/// `Retry-After` in whole seconds, when the provider sent one.
pub(super) fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(secs))
}
