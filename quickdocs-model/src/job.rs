use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Queue task type for repository indexing jobs.
pub const TASK_TYPE_INDEX_REPO: &str = "repo:index";

/// Owner and repo names as GitHub accepts them: leading alphanumeric, then
/// alphanumerics, hyphens, underscores, or dots, 100 chars max.
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,99}$").expect("slug regex should compile"));

/// Returns true when `value` is a valid GitHub owner or repository slug.
pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// Immutable payload of an indexing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJob {
    #[serde(rename = "repoId")]
    pub repo_id: String,
    pub owner: String,
    pub repo: String,
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl IndexJob {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
