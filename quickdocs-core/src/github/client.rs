use std::time::Duration;

use reqwest::{StatusCode, header};
use tracing::warn;

use crate::error::{IndexError, Result};

pub(crate) const API_BASE_URL: &str = "https://api.github.com";
pub(crate) const RAW_BASE_URL: &str = "https://raw.githubusercontent.com";

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over reqwest with GitHub authentication and rate-limit
/// handling. Carries no per-job state and is freely shared between jobs.
#[derive(Clone, Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    access_token: Option<String>,
}

impl GithubClient {
    pub fn new(access_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("quickdocs-worker")
            .build()?;

        Ok(Self { http, access_token })
    }

    /// Performs an authenticated GitHub API request.
    pub(crate) async fn get_api(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{API_BASE_URL}{path}");
        self.get_with_retry(&url, true).await
    }

    /// Performs a raw content request. Auth is included when available so
    /// private repositories resolve.
    pub(crate) async fn get_raw(&self, url: &str) -> Result<reqwest::Response> {
        self.get_with_retry(url, false).await
    }

    async fn get_with_retry(&self, url: &str, api_headers: bool) -> Result<reqwest::Response> {
        for attempt in 0..MAX_RETRIES {
            let mut req = self.http.get(url);
            if let Some(token) = &self.access_token {
                req = req.bearer_auth(token);
            }
            if api_headers {
                req = req.header(header::ACCEPT, "application/vnd.github.v3+json");
            }

            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
                let wait = rate_limit_reset_wait(resp.headers())
                    .unwrap_or_else(|| Duration::from_secs(1 << attempt));
                warn!(
                    "GitHub returned {} for {}, retrying in {:?} (attempt {}/{})",
                    status.as_u16(),
                    url,
                    wait,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return Ok(resp);
        }

        Err(IndexError::GitHub(format!(
            "max retries exceeded for GET {url}"
        )))
    }
}

/// Time until the rate-limit window resets, taken from `X-RateLimit-Reset`.
/// Only honored when the reset is imminent; a reset an hour away means the
/// job should fail and be retried by the queue instead.
fn rate_limit_reset_wait(headers: &header::HeaderMap) -> Option<Duration> {
    let reset: i64 = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse().ok()?;
    let wait = reset - chrono::Utc::now().timestamp();
    if wait > 0 && wait < 60 {
        Some(Duration::from_secs(wait as u64))
    } else {
        None
    }
}
