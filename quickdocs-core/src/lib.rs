pub mod cache;
pub mod db;
pub mod error;
pub mod github;
pub mod llm;
pub mod notify;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod queue;

pub use cache::RedisCache;
pub use db::{DocumentStore, new_pool};
pub use error::{IndexError, Result};
pub use github::{GithubClient, filter_tree};
pub use llm::{LlmClient, LlmError, RateGovernor};
pub use notify::EmailClient;
pub use orchestrator::{IndexHandler, SelectorLimits};
pub use progress::ProgressReporter;
pub use queue::{JobHandler, JobOutcome, JobQueue, LeasedTask, RedisQueue, WorkerPool};
