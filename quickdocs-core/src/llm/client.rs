use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::LlmError;
use super::anthropic::AnthropicBackend;
use super::backend::{LlmBackend, ProviderRequest, ToolDefinition};
use super::governor::RateGovernor;
use super::openai::OpenAiBackend;

pub const MODEL_SONNET: &str = "claude-sonnet-4-5-20250929";
pub const MODEL_HAIKU: &str = "claude-haiku-4-5-20251001";

pub const OPENAI_MODEL_MAIN: &str = "gpt-4o";
pub const OPENAI_MODEL_FAST: &str = "gpt-4o-mini";

const MAX_RETRIES: u32 = 8;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 4096;
const FAST_MAX_TOKENS: u32 = 2048;

/// Outcome of a single LLM call, including usage for telemetry.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub tool_input: Option<serde_json::Value>,
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

/// The call executor: governs, invokes the provider backend, retries on
/// transient failures with `Retry-After` taking precedence over exponential
/// backoff, and records token usage against the governor.
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
    governor: RateGovernor,
    main_model: String,
    fast_model: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.backend.provider_name())
            .field("main_model", &self.main_model)
            .field("fast_model", &self.fast_model)
            .finish()
    }
}

impl LlmClient {
    pub fn anthropic(api_key: String, rpm_limit: u32, tpm_limit: u32) -> Result<Self, LlmError> {
        Ok(Self::with_backend(
            Arc::new(AnthropicBackend::new(api_key)?),
            MODEL_SONNET,
            MODEL_HAIKU,
            rpm_limit,
            tpm_limit,
        ))
    }

    pub fn openai(api_key: String, rpm_limit: u32, tpm_limit: u32) -> Result<Self, LlmError> {
        Ok(Self::with_backend(
            Arc::new(OpenAiBackend::new(api_key)?),
            OPENAI_MODEL_MAIN,
            OPENAI_MODEL_FAST,
            rpm_limit,
            tpm_limit,
        ))
    }

    pub fn with_backend(
        backend: Arc<dyn LlmBackend>,
        main_model: &str,
        fast_model: &str,
        rpm_limit: u32,
        tpm_limit: u32,
    ) -> Self {
        Self {
            backend,
            governor: RateGovernor::new(rpm_limit, tpm_limit),
            main_model: main_model.to_string(),
            fast_model: fast_model.to_string(),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Calls the main model with tool definitions for structured output. The
    /// absence of a tool call in the response is a non-retryable failure.
    pub async fn call_with_tools(
        &self,
        cancel: &CancellationToken,
        system: &str,
        user: &str,
        tools: Vec<ToolDefinition>,
    ) -> Result<CallResult, LlmError> {
        self.execute(cancel, &self.main_model, system, user, tools, MAX_TOKENS, true)
            .await
    }

    /// Calls the fast/cheap model for plain text generation.
    pub async fn call_text(
        &self,
        cancel: &CancellationToken,
        system: &str,
        user: &str,
    ) -> Result<CallResult, LlmError> {
        self.execute(
            cancel,
            &self.fast_model,
            system,
            user,
            Vec::new(),
            FAST_MAX_TOKENS,
            false,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        cancel: &CancellationToken,
        model: &str,
        system: &str,
        user: &str,
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
        require_tool: bool,
    ) -> Result<CallResult, LlmError> {
        self.governor.await_request(cancel).await?;

        let req = ProviderRequest {
            model: model.to_string(),
            system: system.to_string(),
            user: user.to_string(),
            tools,
            max_tokens,
        };

        let mut last_err = LlmError::Api("no attempts made".to_string());

        for attempt in 0..MAX_RETRIES {
            match self.backend.call(&req).await {
                Ok(resp) => {
                    debug!(
                        provider = self.backend.provider_name(),
                        model,
                        input_tokens = resp.input_tokens,
                        output_tokens = resp.output_tokens,
                        "LLM call completed"
                    );
                    self.governor
                        .consume_tokens(cancel, resp.input_tokens + resp.output_tokens)
                        .await;

                    if require_tool && resp.tool_input.is_none() {
                        return Err(LlmError::MissingToolCall(format!(
                            "model {model} answered without the required tool call"
                        )));
                    }

                    return Ok(CallResult {
                        tool_input: resp.tool_input,
                        text: resp.text,
                        input_tokens: resp.input_tokens,
                        output_tokens: resp.output_tokens,
                        model: model.to_string(),
                    });
                }
                Err(e) if e.is_non_retryable() => return Err(e),
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(e) => {
                    let retry_after = match &e {
                        LlmError::Throttled { retry_after } => *retry_after,
                        _ => None,
                    };
                    last_err = e;

                    if attempt < MAX_RETRIES - 1 {
                        let backoff = retry_backoff(attempt, retry_after);
                        warn!(
                            "LLM call to {model} failed (attempt {}/{}): {last_err}, retrying in {:?}",
                            attempt + 1,
                            MAX_RETRIES,
                            backoff
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }

        Err(last_err)
    }
}

/// Backoff for a retry attempt. A provider `Retry-After` hint takes
/// precedence; otherwise exponential from the base, capped.
fn retry_backoff(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(hint) = retry_after {
        if hint > Duration::ZERO {
            return hint;
        }
    }
    (BASE_BACKOFF * (1 << attempt.min(6))).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedBackend;
    use super::*;
    use tokio::time::Instant;

    fn client(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, LlmClient) {
        let backend = Arc::new(backend);
        let client =
            LlmClient::with_backend(backend.clone(), "main-model", "fast-model", 6000, 1_000_000);
        (backend, client)
    }

    #[test]
    fn backoff_honors_retry_after_and_caps() {
        assert_eq!(
            retry_backoff(0, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(retry_backoff(0, None), Duration::from_secs(2));
        assert_eq!(retry_backoff(3, None), Duration::from_secs(16));
        assert_eq!(retry_backoff(7, None), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_storm_resolves_on_third_attempt() {
        let (backend, client) = client(ScriptedBackend::new(vec![
            Err(LlmError::Throttled {
                retry_after: Some(Duration::from_secs(3)),
            }),
            Err(LlmError::Throttled {
                retry_after: Some(Duration::from_secs(3)),
            }),
            ScriptedBackend::text_response("hello"),
        ]));

        let cancel = CancellationToken::new();
        let start = Instant::now();
        let result = client.call_text(&cancel, "sys", "user").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result.text, "hello");
        assert_eq!(backend.calls(), 3);
        assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tool_call_is_not_retried() {
        let (backend, client) = client(ScriptedBackend::new(vec![
            ScriptedBackend::text_response("no tool here"),
            ScriptedBackend::text_response("never reached"),
        ]));

        let cancel = CancellationToken::new();
        let err = client
            .call_with_tools(
                &cancel,
                "sys",
                "user",
                vec![ToolDefinition {
                    name: "t".to_string(),
                    description: "d".to_string(),
                    input_schema: serde_json::json!({"type": "object"}),
                }],
            )
            .await
            .unwrap_err();

        assert!(err.is_non_retryable());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parse_errors_from_backend_short_circuit() {
        let (backend, client) = client(ScriptedBackend::new(vec![
            Err(LlmError::Parse("bad arguments".to_string())),
            ScriptedBackend::text_response("never reached"),
        ]));

        let cancel = CancellationToken::new();
        let err = client.call_text(&cancel, "sys", "user").await.unwrap_err();
        assert!(err.is_non_retryable());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_the_retry_budget() {
        let script: Vec<Result<super::super::backend::ProviderResponse, LlmError>> = (0..10)
            .map(|i| Err(LlmError::Api(format!("boom {i}"))))
            .collect();
        let (backend, client) = client(ScriptedBackend::new(script));

        let cancel = CancellationToken::new();
        let err = client.call_text(&cancel, "sys", "user").await.unwrap_err();
        assert!(!err.is_non_retryable());
        assert_eq!(backend.calls(), 8);
    }
}
