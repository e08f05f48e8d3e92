//! The four-stage documentation pipeline: overview, per-chunk module
//! analysis, synthesis, and Q&A context generation.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quickdocs_model::{
    Documentation, DirectoryChunk, FileStructure, ModuleAnalysis, RepoStatus, SynthesisResult,
    SystemOverview,
};

use crate::error::{IndexError, Result};

use super::chunker::chunk_by_directory;
use super::client::LlmClient;
use super::stage::{STAGE_COOLDOWN, STAGE_MAX_ATTEMPTS, run_stage};
use super::{prompts, schemas};

/// Where the pipeline reports staged progress. The orchestrator backs this
/// with the durable + cached status writer; tests collect the calls.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, status: RepoStatus, progress: u8, message: &str);
}

#[derive(Debug, Default)]
struct ModuleStageResult {
    modules: Vec<ModuleAnalysis>,
    skipped: Vec<String>,
}

/// Runs the full pipeline and returns the assembled documentation record.
pub async fn run_pipeline(
    client: &LlmClient,
    cancel: &CancellationToken,
    structures: Vec<FileStructure>,
    readme: &str,
    file_tree: &str,
    package_files: &str,
    progress: &dyn ProgressSink,
) -> Result<Documentation> {
    // Stage 1: system overview (40-50%).
    progress
        .report(RepoStatus::Analyzing, 40, "Generating system overview...")
        .await;
    let overview = run_stage(cancel, "overview", STAGE_MAX_ATTEMPTS, STAGE_COOLDOWN, || {
        run_overview_stage(client, cancel, readme, file_tree, package_files)
    })
    .await?;
    info!("Stage 1 complete: system overview generated");

    // Stage 2: module analysis (50-70%).
    progress
        .report(RepoStatus::Analyzing, 50, "Analyzing code modules...")
        .await;
    let chunks = chunk_by_directory(structures);
    let module_result = run_module_stage(client, cancel, &chunks, progress).await?;
    info!(
        "Stage 2 complete: {} modules analyzed, {} skipped",
        module_result.modules.len(),
        module_result.skipped.len()
    );

    // Stage 3: synthesis (70-90%).
    progress
        .report(
            RepoStatus::Analyzing,
            70,
            "Synthesizing architecture and tech stack...",
        )
        .await;
    let overview_json = serde_json::to_string(&overview)?;
    let modules_json = serde_json::to_string(&module_result.modules)?;
    let synthesis = run_stage(cancel, "synthesis", STAGE_MAX_ATTEMPTS, STAGE_COOLDOWN, || {
        run_synthesis_stage(client, cancel, &overview_json, &modules_json)
    })
    .await?;
    info!("Stage 3 complete: synthesis done");

    let mut doc = Documentation {
        system_overview: overview,
        key_modules: module_result.modules,
        architecture: synthesis.architecture,
        tech_stack: synthesis.tech_stack,
        entry_points: synthesis.entry_points,
        dependencies: synthesis.dependencies,
        repo_context: String::new(),
    };

    // Stage 4: Q&A context (90-95%). No stage retries; the overview doubles
    // as a fallback so this stage can never fail the job.
    progress
        .report(RepoStatus::Analyzing, 90, "Generating Q&A context...")
        .await;
    let full_doc_json = serde_json::to_string(&doc)?;
    let mut repo_context = match run_context_stage(client, cancel, &full_doc_json).await {
        Ok(text) => text,
        Err(e) => {
            warn!("context generation failed: {e}, using overview as fallback");
            format!(
                "{}\n\n{}",
                doc.system_overview.description, doc.system_overview.purpose
            )
        }
    };

    if !module_result.skipped.is_empty() {
        let _ = write!(
            repo_context,
            "\n\nNote: {} module(s) could not be analyzed and were skipped: {}",
            module_result.skipped.len(),
            module_result.skipped.join(", ")
        );
    }
    doc.repo_context = repo_context;
    info!("Stage 4 complete: Q&A context generated");

    Ok(doc)
}

async fn run_overview_stage(
    client: &LlmClient,
    cancel: &CancellationToken,
    readme: &str,
    file_tree: &str,
    package_files: &str,
) -> Result<SystemOverview> {
    let user = prompts::overview_user(readme, file_tree, package_files);
    let result = client
        .call_with_tools(
            cancel,
            prompts::SYSTEM_OVERVIEW,
            &user,
            vec![schemas::system_overview_tool()],
        )
        .await?;
    parse_tool_output(result.tool_input, "overview")
}

/// Analyzes every chunk sequentially, each behind its own stage-level retry
/// budget. A chunk that still fails is skipped so one bad directory cannot
/// sink the job; the stage fails only when nothing was analyzed at all.
async fn run_module_stage(
    client: &LlmClient,
    cancel: &CancellationToken,
    chunks: &[DirectoryChunk],
    progress: &dyn ProgressSink,
) -> Result<ModuleStageResult> {
    let mut result = ModuleStageResult::default();
    let total = chunks.len();

    for (i, chunk) in chunks.iter().enumerate() {
        let pct = 50 + 20 * (i + 1) / total.max(1);
        progress
            .report(
                RepoStatus::Analyzing,
                pct as u8,
                &format!("Analyzing module {}/{}: {}", i + 1, total, chunk.dir_path),
            )
            .await;

        let stage_name = format!("module:{}", chunk.dir_path);
        match run_stage(cancel, &stage_name, STAGE_MAX_ATTEMPTS, STAGE_COOLDOWN, || {
            analyze_chunk(client, cancel, chunk)
        })
        .await
        {
            Ok(mut module) => {
                module.module_path = chunk.dir_path.clone();
                result.modules.push(module);
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(
                    "Skipping module {} after {} attempts: {e}",
                    chunk.dir_path, STAGE_MAX_ATTEMPTS
                );
                result.skipped.push(chunk.dir_path.clone());
            }
        }
    }

    if result.modules.is_empty() {
        return Err(IndexError::Internal(format!(
            "all {} module analyses failed",
            chunks.len()
        )));
    }

    Ok(result)
}

async fn analyze_chunk(
    client: &LlmClient,
    cancel: &CancellationToken,
    chunk: &DirectoryChunk,
) -> Result<ModuleAnalysis> {
    let user = prompts::module_user(&chunk.dir_path, &chunk.files);
    let result = client
        .call_with_tools(
            cancel,
            prompts::MODULE_ANALYSIS,
            &user,
            vec![schemas::module_analysis_tool()],
        )
        .await?;
    parse_tool_output(result.tool_input, "module")
}

async fn run_synthesis_stage(
    client: &LlmClient,
    cancel: &CancellationToken,
    overview_json: &str,
    modules_json: &str,
) -> Result<SynthesisResult> {
    let user = prompts::synthesis_user(overview_json, modules_json);
    let result = client
        .call_with_tools(
            cancel,
            prompts::SYNTHESIS,
            &user,
            vec![schemas::synthesis_tool()],
        )
        .await?;
    parse_tool_output(result.tool_input, "synthesis")
}

async fn run_context_stage(
    client: &LlmClient,
    cancel: &CancellationToken,
    full_doc_json: &str,
) -> Result<String> {
    let user = prompts::context_user(full_doc_json);
    let result = client
        .call_text(cancel, prompts::CONTEXT_GENERATION, &user)
        .await?;
    Ok(result.text)
}

/// Deserializes tool output into its typed record. Absent or malformed output
/// is deterministic for the input, hence non-retryable.
fn parse_tool_output<T: DeserializeOwned>(
    input: Option<serde_json::Value>,
    stage: &str,
) -> Result<T> {
    let value = input.ok_or_else(|| {
        IndexError::NonRetryable(format!("{stage}: response carried no tool output"))
    })?;
    serde_json::from_value(value)
        .map_err(|e| IndexError::NonRetryable(format!("parsing {stage} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::super::LlmError;
    use super::super::backend::ProviderResponse;
    use super::super::testing::ScriptedBackend;
    use super::*;
    use std::result::Result;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingSink {
        reports: Mutex<Vec<(RepoStatus, u8, String)>>,
    }

    #[async_trait]
    impl ProgressSink for CollectingSink {
        async fn report(&self, status: RepoStatus, progress: u8, message: &str) {
            self.reports
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((status, progress, message.to_string()));
        }
    }

    fn overview_output() -> Result<ProviderResponse, LlmError> {
        ScriptedBackend::tool_response(json!({
            "description": "A sample service.",
            "purpose": "Demonstrates the pipeline.",
            "keyFeatures": ["indexing"],
            "gettingStarted": "make run",
            "mainLanguage": "Go",
            "repoType": "service",
            "setupGuide": {"prerequisites": "go", "installation": "go build", "running": "./svc"}
        }))
    }

    fn module_output(name: &str) -> Result<ProviderResponse, LlmError> {
        ScriptedBackend::tool_response(json!({
            "moduleName": name,
            "description": "module docs",
            "keyExports": [],
            "internalDependencies": [],
            "publicAPI": [],
            "sourceFiles": []
        }))
    }

    fn synthesis_output() -> Result<ProviderResponse, LlmError> {
        ScriptedBackend::tool_response(json!({
            "architecture": {"description": "layers", "components": [], "dataFlow": "down"},
            "techStack": {"languages": ["Go"], "frameworks": []},
            "entryPoints": {"main": []},
            "dependencies": {"runtime": [], "key": []}
        }))
    }

    /// One small root file and one `src` file big enough to stand alone,
    /// which chunks to `[root, src]` after merging and ordering.
    fn sample_structures() -> Vec<FileStructure> {
        let big = FileStructure {
            path: "src/engine.go".to_string(),
            language: "go".to_string(),
            source_code: Some("x".repeat(12_000)),
            ..FileStructure::default()
        };
        let small = FileStructure {
            path: "main.go".to_string(),
            language: "go".to_string(),
            ..FileStructure::default()
        };
        vec![big, small]
    }

    fn client_with(script: Vec<Result<ProviderResponse, LlmError>>) -> (Arc<ScriptedBackend>, LlmClient) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let client =
            LlmClient::with_backend(backend.clone(), "main-model", "fast-model", 6000, 1_000_000);
        (backend, client)
    }

    #[tokio::test(start_paused = true)]
    async fn assembles_documentation_across_all_stages() {
        let (_, client) = client_with(vec![
            overview_output(),
            module_output("root"),
            module_output("src"),
            synthesis_output(),
            ScriptedBackend::text_response("dense context"),
        ]);
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let doc = run_pipeline(
            &client,
            &cancel,
            sample_structures(),
            "# readme",
            "main.go\nsrc/engine.go",
            "--- go.mod ---",
            &sink,
        )
        .await
        .unwrap();

        assert_eq!(doc.system_overview.main_language, "Go");
        assert_eq!(doc.key_modules.len(), 2);
        assert_eq!(doc.key_modules[0].module_path, "root");
        assert_eq!(doc.key_modules[1].module_path, "src");
        assert_eq!(doc.architecture.description, "layers");
        assert_eq!(doc.repo_context, "dense context");

        let reports = sink.reports.lock().unwrap();
        let pcts: Vec<u8> = reports.iter().map(|(_, p, _)| *p).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{pcts:?}");
        assert!(pcts.contains(&40) && pcts.contains(&70) && pcts.contains(&90));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chunk_is_skipped_and_noted() {
        // The root chunk exhausts its three stage attempts (each of which
        // burns the executor's full eight-call budget on throttles), then
        // src, synthesis, and context succeed.
        let mut script: Vec<Result<ProviderResponse, LlmError>> = vec![overview_output()];
        for _ in 0..24 {
            script.push(Err(LlmError::Throttled {
                retry_after: Some(Duration::from_secs(1)),
            }));
        }
        script.push(module_output("src"));
        script.push(synthesis_output());
        script.push(ScriptedBackend::text_response("context"));

        let (_, client) = client_with(script);
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let doc = run_pipeline(
            &client,
            &cancel,
            sample_structures(),
            "",
            "",
            "",
            &sink,
        )
        .await
        .unwrap();

        assert_eq!(doc.key_modules.len(), 1);
        assert_eq!(doc.key_modules[0].module_path, "src");
        assert!(
            doc.repo_context
                .contains("Note: 1 module(s) could not be analyzed and were skipped: root"),
            "{}",
            doc.repo_context
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_overview_output_fails_without_retries() {
        let (backend, client) = client_with(vec![
            ScriptedBackend::tool_response(json!({"unexpected": "shape"})),
            overview_output(),
        ]);
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let err = run_pipeline(&client, &cancel, sample_structures(), "", "", "", &sink)
            .await
            .unwrap_err();

        assert!(err.is_non_retryable(), "{err}");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_chunks_failing_fails_the_stage() {
        let (_, client) = client_with(vec![
            overview_output(),
            ScriptedBackend::tool_response(json!({"bad": 1})),
            ScriptedBackend::tool_response(json!({"bad": 2})),
        ]);
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let err = run_pipeline(&client, &cancel, sample_structures(), "", "", "", &sink)
            .await
            .unwrap_err();

        assert!(!err.is_non_retryable());
        assert!(err.to_string().contains("all 2 module analyses failed"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn context_failure_falls_back_to_the_overview() {
        let mut script = vec![
            overview_output(),
            module_output("root"),
            module_output("src"),
            synthesis_output(),
        ];
        // The context call retries its full budget, then the pipeline falls
        // back rather than failing.
        for _ in 0..8 {
            script.push(Err(LlmError::Api("overloaded".to_string())));
        }

        let (_, client) = client_with(script);
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let doc = run_pipeline(&client, &cancel, sample_structures(), "", "", "", &sink)
            .await
            .unwrap();

        assert_eq!(doc.repo_context, "A sample service.\n\nDemonstrates the pipeline.");
    }
}
