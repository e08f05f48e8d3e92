//! Redis-backed status cache and the per-repository indexing lock.

use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing::{debug, info};

use quickdocs_model::{IndexingStatus, RepoStatus};

use crate::error::Result;

/// Ephemeral status records expire after an hour.
const STATUS_TTL: Duration = Duration::from_secs(60 * 60);

/// Longer than the 30-minute per-task timeout so a held lock always outlives
/// the job it protects, but short enough that a crashed worker's lock expires
/// within a reasonable window.
const LOCK_TTL: Duration = Duration::from_secs(35 * 60);

const LOCK_PREFIX: &str = "lock:indexing:";

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    pub fn indexing_status(owner: &str, repo: &str) -> String {
        format!("indexing:{owner}/{repo}:status")
    }

    pub fn docs(owner: &str, repo: &str) -> String {
        format!("docs:{owner}/{repo}")
    }

    pub fn lock(owner: &str, repo: &str) -> String {
        format!("{LOCK_PREFIX}{owner}/{repo}")
    }
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Successfully connected to Redis");

        Ok(Self { conn })
    }

    /// Hands out a connection handle; `ConnectionManager` multiplexes
    /// internally so clones are cheap. The job queue shares this connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Stores the current indexing status for a repo with a 1-hour TTL.
    pub async fn set_indexing_status(
        &self,
        owner: &str,
        repo: &str,
        status: RepoStatus,
        progress: u8,
        message: &str,
    ) -> Result<()> {
        let key = CacheKeys::indexing_status(owner, repo);
        let value = serde_json::to_string(&IndexingStatus {
            status,
            progress,
            message: message.to_string(),
        })?;

        redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("EX")
            .arg(STATUS_TTL.as_secs())
            .query_async::<()>(&mut self.connection())
            .await?;

        Ok(())
    }

    /// Stores the documentation JSON with no TTL.
    pub async fn cache_docs(&self, owner: &str, repo: &str, docs_json: &str) -> Result<()> {
        let key = CacheKeys::docs(owner, repo);
        redis::cmd("SET")
            .arg(&key)
            .arg(docs_json)
            .query_async::<()>(&mut self.connection())
            .await?;
        Ok(())
    }

    /// Attempts to acquire the indexing lock for a repo. Returns true if the
    /// lock was acquired, false if another worker holds it.
    pub async fn acquire_lock(&self, owner: &str, repo: &str) -> Result<bool> {
        let key = CacheKeys::lock(owner, repo);
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("locked")
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL.as_secs())
            .query_async(&mut self.connection())
            .await?;
        Ok(acquired.is_some())
    }

    /// Releases the indexing lock. Idempotent: releasing an absent lock is
    /// not an error.
    pub async fn release_lock(&self, owner: &str, repo: &str) -> Result<()> {
        let key = CacheKeys::lock(owner, repo);
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<()>(&mut self.connection())
            .await?;
        Ok(())
    }

    /// Removes all indexing locks. Safe to call on startup in a single-worker
    /// deployment only: any lock present before the worker starts is stale.
    pub async fn clear_stale_locks(&self) -> Result<()> {
        let mut conn = self.connection();
        let mut cursor: u64 = 0;
        let pattern = format!("{LOCK_PREFIX}*");
        let mut cleared = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                cleared += keys.len();
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<()>(&mut conn)
                    .await?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if cleared > 0 {
            info!("Cleared {} stale indexing lock(s)", cleared);
        } else {
            debug!("No stale indexing locks found");
        }

        Ok(())
    }
}
