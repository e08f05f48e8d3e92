use tracing::{info, warn};

use quickdocs_model::RepoStatus;

use crate::cache::RedisCache;
use crate::db::DocumentStore;

/// Writes job progress to both the durable status row and the ephemeral
/// cache record. Progress is advisory: write failures are logged and never
/// propagated to the job.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    store: DocumentStore,
    cache: RedisCache,
}

impl ProgressReporter {
    pub fn new(store: DocumentStore, cache: RedisCache) -> Self {
        Self { store, cache }
    }

    /// Monotonicity of `progress` is the caller's responsibility.
    pub async fn report(
        &self,
        repo_id: &str,
        owner: &str,
        repo: &str,
        status: RepoStatus,
        progress: u8,
        message: &str,
    ) {
        if let Err(e) = self
            .store
            .update_repo_status(repo_id, status, i32::from(progress), None)
            .await
        {
            warn!("[{owner}/{repo}] failed to persist status: {e}");
        }

        if let Err(e) = self
            .cache
            .set_indexing_status(owner, repo, status, progress, message)
            .await
        {
            warn!("[{owner}/{repo}] failed to cache status: {e}");
        }

        info!("[{owner}/{repo}] {status} {progress}% - {message}");
    }
}
