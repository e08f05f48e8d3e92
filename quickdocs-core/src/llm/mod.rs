//! LLM access and the documentation pipeline.
//!
//! All provider traffic flows through one [`LlmClient`], which is paced by a
//! process-global [`RateGovernor`]: isolating rate budgets per job would
//! violate provider quotas once multiple jobs run in parallel.

mod anthropic;
mod backend;
mod chunker;
mod client;
mod governor;
mod openai;
mod pipeline;
mod prompts;
mod schemas;
mod stage;

use std::time::Duration;

use thiserror::Error;

pub use anthropic::AnthropicBackend;
pub use backend::{LlmBackend, ProviderRequest, ProviderResponse, ToolDefinition};
pub use chunker::{MAX_CHUNK_TOKENS, MIN_CHUNK_TOKENS, chunk_by_directory};
pub use client::{
    CallResult, LlmClient, MODEL_HAIKU, MODEL_SONNET, OPENAI_MODEL_FAST, OPENAI_MODEL_MAIN,
};
pub use governor::RateGovernor;
pub use openai::OpenAiBackend;
pub use pipeline::{ProgressSink, run_pipeline};
pub use stage::{STAGE_COOLDOWN, STAGE_MAX_ATTEMPTS, run_stage};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited by provider")]
    Throttled { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Tool output was present but not valid JSON. Deterministic for a given
    /// input, so never retried.
    #[error("parsing tool output: {0}")]
    Parse(String),

    /// The model answered without the required tool call. Deterministic for a
    /// given input, so never retried.
    #[error("no tool call in response: {0}")]
    MissingToolCall(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl LlmError {
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, LlmError::Parse(_) | LlmError::MissingToolCall(_))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::backend::{LlmBackend, ProviderRequest, ProviderResponse};
    use super::LlmError;

    /// Backend that replays a scripted sequence of responses.
    pub struct ScriptedBackend {
        script: Mutex<Vec<Result<ProviderResponse, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<Result<ProviderResponse, LlmError>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn tool_response(input: serde_json::Value) -> Result<ProviderResponse, LlmError> {
            Ok(ProviderResponse {
                text: String::new(),
                tool_input: Some(input),
                input_tokens: 100,
                output_tokens: 50,
            })
        }

        pub fn text_response(text: &str) -> Result<ProviderResponse, LlmError> {
            Ok(ProviderResponse {
                text: text.to_string(),
                tool_input: None,
                input_tokens: 100,
                output_tokens: 50,
            })
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn call(&self, _req: &ProviderRequest) -> Result<ProviderResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop()
                .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }
}
