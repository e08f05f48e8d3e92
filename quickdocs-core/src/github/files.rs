use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::{IndexError, Result};

use super::client::{GithubClient, RAW_BASE_URL};

/// In-flight download cap per job; keeps memory and socket pressure bounded.
const MAX_CONCURRENT_DOWNLOADS: usize = 20;

impl GithubClient {
    /// Downloads file contents concurrently from the raw content host.
    /// Files that fail to download or exceed `max_size_bytes` are skipped
    /// with a warning; a single bad file never aborts the batch.
    pub async fn fetch_files(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        paths: &[String],
        max_size_bytes: u64,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
        let mut tasks: JoinSet<Option<(String, Vec<u8>)>> = JoinSet::new();

        for path in paths {
            let semaphore = semaphore.clone();
            let client = self.clone();
            let owner = owner.to_string();
            let repo = repo.to_string();
            let branch = branch.to_string();
            let path = path.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;

                match client
                    .download_file(&owner, &repo, &branch, &path, max_size_bytes)
                    .await
                {
                    Ok(data) => Some((path, data)),
                    Err(e) => {
                        warn!("skipping {path}: {e}");
                        None
                    }
                }
            });
        }

        let mut results = HashMap::with_capacity(paths.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((path, data))) => {
                    results.insert(path, data);
                }
                Ok(None) => {}
                Err(e) => warn!("download task failed: {e}"),
            }
        }

        Ok(results)
    }

    /// Fetches a single file, enforcing the size limit both on the declared
    /// Content-Length and on the streamed body (the header can lie).
    async fn download_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        max_size_bytes: u64,
    ) -> Result<Vec<u8>> {
        let url = format!("{RAW_BASE_URL}/{owner}/{repo}/{branch}/{path}");

        let mut resp = self.get_raw(&url).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IndexError::GitHub(format!("status {}", status.as_u16())));
        }

        if let Some(len) = resp.content_length() {
            if len > max_size_bytes {
                return Err(IndexError::GitHub(format!(
                    "file too large: {len} bytes (max {max_size_bytes})"
                )));
            }
        }

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if data.len() as u64 + chunk.len() as u64 > max_size_bytes {
                return Err(IndexError::GitHub(format!(
                    "file too large: read past {max_size_bytes} bytes"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        Ok(data)
    }
}
