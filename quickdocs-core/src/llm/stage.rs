use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{IndexError, Result};

pub const STAGE_MAX_ATTEMPTS: u32 = 3;
pub const STAGE_COOLDOWN: Duration = Duration::from_secs(30);

/// Retry harness for one pipeline stage. Each attempt internally still goes
/// through the call executor's own retry budget; this layer covers failures
/// that survived it. Non-retryable errors bail immediately.
pub async fn run_stage<T, F, Fut>(
    cancel: &CancellationToken,
    name: &str,
    max_attempts: u32,
    cooldown: Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = IndexError::Internal(format!("stage {name:?}: no attempts made"));

    for attempt in 0..max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_non_retryable() => {
                warn!("stage {name:?} failed with non-retryable error, not retrying: {e}");
                return Err(e);
            }
            Err(e) => {
                last_err = e;
                if attempt < max_attempts - 1 {
                    warn!(
                        "stage {name:?} failed (attempt {}/{}): {last_err}, retrying in {:?}",
                        attempt + 1,
                        max_attempts,
                        cooldown
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(IndexError::Cancelled(format!(
                                "stage {name:?} cancelled during cooldown"
                            )));
                        }
                        _ = tokio::time::sleep(cooldown) => {}
                    }
                }
            }
        }
    }

    Err(IndexError::Internal(format!(
        "stage {name:?} failed after {max_attempts} attempts: {last_err}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let start = Instant::now();
        let out = run_stage(&cancel, "demo", 3, Duration::from_secs(30), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(IndexError::Internal("transient".to_string()))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(out, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Two cooldowns elapsed between the three attempts.
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_bypasses_remaining_attempts() {
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let err = run_stage(&cancel, "demo", 3, Duration::from_secs(30), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(IndexError::NonRetryable("malformed output".to_string()))
        })
        .await
        .unwrap_err();

        assert!(err.is_non_retryable());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_reports_the_last_error() {
        let cancel = CancellationToken::new();

        let err = run_stage(&cancel, "demo", 2, Duration::from_millis(10), || async {
            Err::<(), _>(IndexError::Internal("still broken".to_string()))
        })
        .await
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("failed after 2 attempts"), "{msg}");
        assert!(msg.contains("still broken"), "{msg}");
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_cooldown() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_stage(&cancel, "demo", 3, Duration::from_secs(3600), || async {
            Err::<(), _>(IndexError::Internal("fails once".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, IndexError::Cancelled(_)));
    }
}
