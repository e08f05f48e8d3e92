//! The HTTP surface: one enqueue endpoint and a health check.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use quickdocs_core::queue::{EnqueuedTask, JobQueue};
use quickdocs_model::{IndexJob, is_valid_slug};

#[derive(Clone)]
pub struct ApiState {
    queue: Arc<dyn JobQueue>,
}

pub fn router(queue: Arc<dyn JobQueue>) -> Router {
    Router::new()
        .route("/enqueue", post(enqueue_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { queue })
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    #[serde(rename = "repoId", default)]
    repo_id: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    repo: String,
    #[serde(rename = "fullName", default)]
    full_name: Option<String>,
}

async fn enqueue_handler(
    State(state): State<ApiState>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<Json<EnqueuedTask>, AppError> {
    let Json(request) =
        payload.map_err(|e| AppError::bad_request(format!("invalid request body: {e}")))?;

    if request.repo_id.is_empty() || request.owner.is_empty() || request.repo.is_empty() {
        return Err(AppError::bad_request("repoId, owner, and repo are required"));
    }

    if !is_valid_slug(&request.owner) || !is_valid_slug(&request.repo) {
        return Err(AppError::bad_request(
            "owner and repo must be valid GitHub identifiers (alphanumeric, hyphens, underscores, dots)",
        ));
    }

    let job = IndexJob {
        repo_id: request.repo_id,
        owner: request.owner,
        repo: request.repo,
        access_token: None,
    };
    debug!(
        full_name = request.full_name.as_deref().unwrap_or(""),
        "enqueueing indexing job for {}",
        job.full_name()
    );

    match state.queue.enqueue(&job).await {
        Ok(task) => Ok(Json(task)),
        Err(e) => {
            error!("failed to enqueue task for {}: {e}", job.full_name());
            Err(AppError::internal("failed to enqueue task"))
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use quickdocs_core::error::Result;
    use quickdocs_core::queue::LeasedTask;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<IndexJob>>,
        fail: bool,
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn enqueue(&self, job: &IndexJob) -> Result<EnqueuedTask> {
            if self.fail {
                return Err(quickdocs_core::IndexError::Queue("redis down".to_string()));
            }
            self.jobs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(job.clone());
            Ok(EnqueuedTask {
                task_id: "task-123".to_string(),
                queue: "default".to_string(),
            })
        }

        async fn dequeue(&self, _wait: Duration) -> Result<Option<LeasedTask>> {
            Ok(None)
        }

        async fn ack(&self, _task: &LeasedTask) -> Result<()> {
            Ok(())
        }

        async fn nack_retry(&self, _task: &LeasedTask) -> Result<()> {
            Ok(())
        }

        async fn promote_due(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn server(queue: Arc<RecordingQueue>) -> TestServer {
        TestServer::new(router(queue)).expect("test server should start")
    }

    #[tokio::test]
    async fn enqueues_a_valid_request() {
        let queue = Arc::new(RecordingQueue::default());
        let server = server(queue.clone());

        let response = server
            .post("/enqueue")
            .json(&json!({"repoId": "r1", "owner": "alice", "repo": "repo-1"}))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["taskId"], "task-123");
        assert_eq!(body["queue"], "default");

        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].full_name(), "alice/repo-1");
    }

    #[tokio::test]
    async fn rejects_missing_fields_and_bad_slugs() {
        let server = server(Arc::new(RecordingQueue::default()));

        let response = server
            .post("/enqueue")
            .json(&json!({"owner": "alice", "repo": "repo-1"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/enqueue")
            .json(&json!({"repoId": "r1", "owner": "-bad-", "repo": "repo"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.post("/enqueue").text("not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn enqueue_failure_maps_to_500() {
        let queue = Arc::new(RecordingQueue {
            fail: true,
            ..RecordingQueue::default()
        });
        let server = server(queue);

        let response = server
            .post("/enqueue")
            .json(&json!({"repoId": "r1", "owner": "alice", "repo": "repo"}))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_and_method_guard() {
        let server = server(Arc::new(RecordingQueue::default()));

        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_text("ok");

        let response = server.get("/enqueue").await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
