use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};

/// Which LLM backend serves the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "anthropic" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(anyhow!(
                "invalid LLM_PROVIDER {other:?}: must be \"anthropic\" or \"openai\""
            )),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Anthropic => f.write_str("anthropic"),
            LlmProvider::OpenAi => f.write_str("openai"),
        }
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub redis_url: String,

    // LLM
    pub llm_provider: LlmProvider,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub llm_rate_limit_rpm: u32,
    pub llm_rate_limit_tpm: u32,

    // Job processing
    pub worker_concurrency: usize,
    pub max_files_per_repo: usize,
    pub max_file_size_bytes: u64,
    pub max_critical_file_size_bytes: u64,

    // HTTP API
    pub api_port: u16,

    // Notifications
    pub resend_api_key: String,
    pub email_from: String,
    pub app_base_url: String,

    // Telemetry (consumed by the external collector sidecar)
    pub otel_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            redis_url: env::var("REDIS_URL").unwrap_or_default(),

            llm_provider: env_or("LLM_PROVIDER", "anthropic").parse()?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            llm_rate_limit_rpm: env_parse("LLM_RATE_LIMIT_RPM", 500)?,
            llm_rate_limit_tpm: env_parse("LLM_RATE_LIMIT_TPM", 200_000)?,

            worker_concurrency: env_parse("WORKER_CONCURRENCY", 5)?,
            max_files_per_repo: env_parse("MAX_FILES_PER_REPO", 2_000)?,
            max_file_size_bytes: env_parse("MAX_FILE_SIZE_BYTES", 102_400)?,
            max_critical_file_size_bytes: env_parse("MAX_CRITICAL_FILE_SIZE_BYTES", 512_000)?,

            api_port: env_parse("WORKER_API_PORT", 8080)?,

            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env_or("NOTIFICATION_FROM_EMAIL", "QuickGitHub <noreply@quickgithub.com>"),
            app_base_url: env_or("APP_BASE_URL", "http://localhost:3000"),

            otel_endpoint: env_or("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4318"),
        };

        if config.database_url.is_empty() {
            bail!("DATABASE_URL is required");
        }
        if config.redis_url.is_empty() {
            bail!("REDIS_URL is required");
        }
        match config.llm_provider {
            LlmProvider::Anthropic if config.anthropic_api_key.is_empty() => {
                bail!("ANTHROPIC_API_KEY is required when LLM_PROVIDER=anthropic");
            }
            LlmProvider::OpenAi if config.openai_api_key.is_empty() => {
                bail!("OPENAI_API_KEY is required when LLM_PROVIDER=openai");
            }
            _ => {}
        }

        Ok(config)
    }
}

fn env_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| anyhow!("invalid {name}: {e}")),
        _ => Ok(default),
    }
}
