use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a repository's indexing job, as persisted in the
/// `"RepoStatus"` database enum and mirrored into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepoStatus {
    Pending,
    Fetching,
    Parsing,
    Analyzing,
    Completed,
    Failed,
    Retrying,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Pending => "PENDING",
            RepoStatus::Fetching => "FETCHING",
            RepoStatus::Parsing => "PARSING",
            RepoStatus::Analyzing => "ANALYZING",
            RepoStatus::Completed => "COMPLETED",
            RepoStatus::Failed => "FAILED",
            RepoStatus::Retrying => "RETRYING",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepoStatus::Completed | RepoStatus::Failed)
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral status record cached under `indexing:<owner>/<repo>:status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingStatus {
    pub status: RepoStatus,
    pub progress: u8,
    pub message: String,
}
