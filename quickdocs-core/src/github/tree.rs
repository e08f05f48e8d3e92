use serde::Deserialize;
use tracing::warn;

use quickdocs_model::TreeEntry;

use crate::error::{IndexError, Result};

use super::client::GithubClient;

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

impl GithubClient {
    /// Retrieves the full recursive file tree for a repository, filtered to
    /// file entries.
    pub async fn fetch_tree(&self, owner: &str, repo: &str) -> Result<Vec<TreeEntry>> {
        let path = format!("/repos/{owner}/{repo}/git/trees/HEAD?recursive=1");

        let resp = self.get_api(&path).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(256).collect();
            return Err(IndexError::GitHub(format!(
                "fetching tree for {owner}/{repo}: status {status}: {snippet}"
            )));
        }

        let result: TreeResponse = resp.json().await?;

        if result.truncated {
            // Very large repos come back truncated; the selector will still
            // prioritize the most important of the entries we did get.
            warn!("tree for {owner}/{repo} was truncated, using partial results");
        }

        Ok(result.tree.into_iter().filter(TreeEntry::is_file).collect())
    }
}
