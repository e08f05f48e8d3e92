use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use quickdocs_model::{FileStructure, IndexJob, RepoStatus};

use crate::cache::RedisCache;
use crate::db::DocumentStore;
use crate::error::{IndexError, Result};
use crate::github::{GithubClient, filter_tree};
use crate::llm::{LlmClient, ProgressSink, run_pipeline};
use crate::notify::EmailClient;
use crate::parser::extract_structure;
use crate::progress::ProgressReporter;
use crate::queue::{JobHandler, JobOutcome, LeasedTask};

/// Selector limits, fixed at startup from the environment.
#[derive(Debug, Clone, Copy)]
pub struct SelectorLimits {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub max_critical_file_size_bytes: u64,
}

/// Handles `repo:index` tasks end to end: lock, fetch, parse, analyze,
/// persist, notify, and classify the outcome for the queue.
#[derive(Debug)]
pub struct IndexHandler {
    store: DocumentStore,
    cache: RedisCache,
    reporter: ProgressReporter,
    llm: Arc<LlmClient>,
    email: Option<EmailClient>,
    limits: SelectorLimits,
}

/// Routes pipeline progress into the durable + cached status writers.
struct JobProgress<'a> {
    reporter: &'a ProgressReporter,
    job: &'a IndexJob,
}

#[async_trait]
impl ProgressSink for JobProgress<'_> {
    async fn report(&self, status: RepoStatus, progress: u8, message: &str) {
        self.reporter
            .report(
                &self.job.repo_id,
                &self.job.owner,
                &self.job.repo,
                status,
                progress,
                message,
            )
            .await;
    }
}

impl IndexHandler {
    pub fn new(
        store: DocumentStore,
        cache: RedisCache,
        llm: Arc<LlmClient>,
        email: Option<EmailClient>,
        limits: SelectorLimits,
    ) -> Self {
        let reporter = ProgressReporter::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            reporter,
            llm,
            email,
            limits,
        }
    }

    /// The indexing phases proper. Any error unwinds into terminal
    /// evaluation in [`JobHandler::handle`].
    async fn run(&self, job: &IndexJob, cancel: &CancellationToken) -> Result<()> {
        let slug = job.full_name();
        let progress = JobProgress {
            reporter: &self.reporter,
            job,
        };

        // Fetch the repository tree.
        progress
            .report(RepoStatus::Fetching, 10, "Fetching repository tree...")
            .await;
        let github = GithubClient::new(job.access_token.clone())?;
        let tree = github.fetch_tree(&job.owner, &job.repo).await?;
        info!("[{slug}] fetched tree with {} entries", tree.len());

        let selected = filter_tree(
            tree,
            self.limits.max_files,
            self.limits.max_file_size_bytes,
            self.limits.max_critical_file_size_bytes,
        );
        info!("[{slug}] selected {} files", selected.len());

        // Download file contents.
        progress
            .report(
                RepoStatus::Fetching,
                20,
                &format!("Downloading {} files...", selected.len()),
            )
            .await;
        let paths: Vec<String> = selected.into_iter().map(|e| e.path).collect();
        // The selector admits critical files up to the larger cap, so the
        // per-download limit has to match it.
        let download_limit = self
            .limits
            .max_critical_file_size_bytes
            .max(self.limits.max_file_size_bytes);
        let files = github
            .fetch_files(&job.owner, &job.repo, "HEAD", &paths, download_limit)
            .await?;
        info!("[{slug}] downloaded {} files", files.len());

        // Parse source into structural summaries.
        progress
            .report(RepoStatus::Parsing, 30, "Parsing source code...")
            .await;
        let mut sorted_paths: Vec<String> = files.keys().cloned().collect();
        sorted_paths.sort();

        let mut structures: Vec<FileStructure> = Vec::with_capacity(sorted_paths.len());
        let mut readme = String::new();
        let mut package_files = String::new();

        for path in &sorted_paths {
            let content = &files[path];
            let base = basename(path).to_lowercase();

            if base == "readme.md" || base == "readme" {
                readme = String::from_utf8_lossy(content).into_owned();
            }
            if is_package_file(&base) {
                package_files.push_str(&format!(
                    "--- {path} ---\n{}\n\n",
                    String::from_utf8_lossy(content)
                ));
            }

            let mut structure = extract_structure(path, content);
            if is_key_file(path) {
                structure.is_key_file = true;
                structure.source_code = Some(String::from_utf8_lossy(content).into_owned());
            }
            structures.push(structure);
        }
        info!("[{slug}] parsed {} files", structures.len());
        let file_tree = sorted_paths.join("\n");

        // LLM pipeline.
        progress
            .report(RepoStatus::Analyzing, 40, "Analyzing with AI...")
            .await;
        let doc = run_pipeline(
            &self.llm,
            cancel,
            structures,
            &readme,
            &file_tree,
            &package_files,
            &progress,
        )
        .await?;
        info!("[{slug}] LLM pipeline completed");

        // Persist.
        progress
            .report(RepoStatus::Analyzing, 95, "Saving documentation...")
            .await;
        self.store.save_documentation(&job.repo_id, &doc).await?;
        self.store
            .update_repo_status(&job.repo_id, RepoStatus::Completed, 100, None)
            .await?;

        // Cache the docs blob; cache trouble never fails a finished job.
        match serde_json::to_string(&doc) {
            Ok(docs_json) => {
                if let Err(e) = self.cache.cache_docs(&job.owner, &job.repo, &docs_json).await {
                    warn!("[{slug}] failed to cache docs: {e}");
                }
            }
            Err(e) => warn!("[{slug}] failed to serialize docs for cache: {e}"),
        }

        self.send_email(job, None).await;

        progress
            .report(RepoStatus::Completed, 100, "Documentation ready!")
            .await;
        Ok(())
    }

    /// Terminal evaluation: decide whether this failure ends the job or the
    /// queue should redeliver it, and perform the matching side effects.
    async fn evaluate_failure(&self, task: &LeasedTask, err: IndexError) -> JobOutcome {
        let job = &task.job;
        let slug = job.full_name();
        let message = err.to_string();

        let is_final = task.retry_count >= task.max_retries || err.is_non_retryable();

        if is_final {
            if let Err(e) = self
                .store
                .update_repo_status(&job.repo_id, RepoStatus::Failed, 0, Some(&message))
                .await
            {
                warn!("[{slug}] failed to persist FAILED status: {e}");
            }
            if let Err(e) = self
                .cache
                .set_indexing_status(&job.owner, &job.repo, RepoStatus::Failed, 0, &message)
                .await
            {
                warn!("[{slug}] failed to cache FAILED status: {e}");
            }
            if let Err(e) = self.cache.release_lock(&job.owner, &job.repo).await {
                warn!("[{slug}] failed to release lock: {e}");
            }

            self.send_email(job, Some(&message)).await;

            error!("[{slug}] indexing permanently failed: {err}");
            JobOutcome::Failed(err)
        } else {
            // Keep the status PENDING so the enqueue API rejects duplicate
            // submissions, and keep the lock so the retry picks it up fast.
            if let Err(e) = self
                .store
                .update_repo_status(&job.repo_id, RepoStatus::Pending, 0, None)
                .await
            {
                warn!("[{slug}] failed to persist PENDING status: {e}");
            }
            if let Err(e) = self
                .cache
                .set_indexing_status(
                    &job.owner,
                    &job.repo,
                    RepoStatus::Retrying,
                    0,
                    "Retrying after error...",
                )
                .await
            {
                warn!("[{slug}] failed to cache RETRYING status: {e}");
            }

            warn!(
                "[{slug}] indexing failed (attempt {}/{}), will retry: {err}",
                task.retry_count + 1,
                task.max_retries + 1
            );
            JobOutcome::Retry(err)
        }
    }

    /// Sends the success (`error == None`) or failure email to the repo's
    /// claimer, if email is configured and a claimer exists. Best-effort.
    async fn send_email(&self, job: &IndexJob, error: Option<&str>) {
        let Some(email) = &self.email else {
            return;
        };
        let slug = job.full_name();

        let to = match self.store.claimer_email(&job.repo_id).await {
            Ok(Some(address)) if !address.is_empty() => address,
            Ok(_) => return,
            Err(e) => {
                warn!("[{slug}] failed to look up claimer email: {e}");
                return;
            }
        };

        let sent = match error {
            None => email.send_indexing_complete(&to, &slug).await,
            Some(message) => email.send_indexing_failed(&to, &slug, message).await,
        };
        if let Err(e) = sent {
            warn!("[{slug}] failed to send notification email: {e}");
        }
    }
}

#[async_trait]
impl JobHandler for IndexHandler {
    async fn handle(&self, task: &LeasedTask, cancel: &CancellationToken) -> JobOutcome {
        let job = &task.job;
        let slug = job.full_name();
        let started = Instant::now();

        info!("[{slug}] starting indexing");

        // Single-writer lock per repository.
        let locked = match self.cache.acquire_lock(&job.owner, &job.repo).await {
            Ok(locked) => locked,
            Err(e) => return self.evaluate_failure(task, e).await,
        };
        if !locked {
            info!("[{slug}] already being indexed by another worker, skipping");
            return JobOutcome::Skipped;
        }

        // Cancellation lands at the next suspension point; panics are
        // recovered so both unwind through terminal evaluation.
        let run = self.run(job, cancel);
        let result = match AssertUnwindSafe(cancel.run_until_cancelled(run))
            .catch_unwind()
            .await
        {
            Ok(Some(result)) => result,
            Ok(None) => Err(IndexError::Cancelled("job cancelled".to_string())),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("[{slug}] panic recovered: {message}");
                Err(IndexError::Internal(format!("panic: {message}")))
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.cache.release_lock(&job.owner, &job.repo).await {
                    warn!("[{slug}] failed to release lock: {e}");
                }
                info!(
                    "[{slug}] indexing completed in {:?}",
                    started.elapsed()
                );
                JobOutcome::Completed
            }
            Err(err) => self.evaluate_failure(task, err).await,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Files whose full source goes to the LLM instead of just signatures:
/// READMEs, manifests, build/container files, and entry points.
fn is_key_file(path: &str) -> bool {
    let base = basename(path).to_lowercase();

    match base.as_str() {
        "readme.md" | "readme" | "readme.rst" | "readme.txt" | "package.json" | "go.mod"
        | "cargo.toml" | "pyproject.toml" | "setup.py" | "requirements.txt" | "gemfile"
        | "pom.xml" | "build.gradle" | "composer.json" | "dockerfile" | "makefile"
        | "docker-compose.yml" | "docker-compose.yaml" => return true,
        _ => {}
    }

    let name_no_ext = match base.rsplit_once('.') {
        Some((name, _)) => name,
        None => base.as_str(),
    };
    if matches!(name_no_ext, "main" | "index" | "app" | "server" | "cli") {
        return true;
    }

    let mut parts = path.split('/');
    matches!(parts.next(), Some(first) if first.eq_ignore_ascii_case("cmd"))
        && parts.next().is_some()
}

/// Files whose content feeds the overview stage's manifest blob.
fn is_package_file(base_lower: &str) -> bool {
    matches!(
        base_lower,
        "package.json"
            | "go.mod"
            | "cargo.toml"
            | "pyproject.toml"
            | "setup.py"
            | "requirements.txt"
            | "gemfile"
            | "pom.xml"
            | "build.gradle"
            | "composer.json"
    )
}
