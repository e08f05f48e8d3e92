use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    NonRetryable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// True for failures where the same input deterministically reproduces
    /// the same failure (malformed tool output, missing tool call). Terminal
    /// evaluation fails such jobs immediately regardless of retry budget.
    pub fn is_non_retryable(&self) -> bool {
        match self {
            IndexError::NonRetryable(_) => true,
            IndexError::Llm(e) => e.is_non_retryable(),
            _ => false,
        }
    }

    /// True when the failure came from shutdown rather than the work itself.
    /// Cancelled jobs are retryable but must stop issuing calls promptly.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            IndexError::Cancelled(_) | IndexError::Llm(LlmError::Cancelled)
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
