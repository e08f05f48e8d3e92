use async_trait::async_trait;

use super::LlmError;

/// A structured-output tool offered to the model. `input_schema` is a JSON
/// Schema object; required fields listed there are enforced when the output
/// is deserialized into its typed record.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One provider-agnostic request. The pipeline only ever sends a system
/// prompt plus a single user message.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    /// Raw input of the first tool call in the response, if any.
    pub tool_input: Option<serde_json::Value>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Provider port. Implementations translate to one vendor's wire format and
/// classify HTTP 429 as [`LlmError::Throttled`] carrying any `Retry-After`
/// hint; everything else about retries is the executor's business.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn call(&self, req: &ProviderRequest) -> Result<ProviderResponse, LlmError>;

    fn provider_name(&self) -> &'static str;
}
