//! Process-global request and token pacing for LLM calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LlmError;

/// A leaky bucket: `tokens` refills continuously at `refill_per_sec` up to
/// `capacity`, and may go negative to represent committed debt.
#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Time until the bucket holds at least `needed` tokens.
    fn wait_for(&self, needed: f64) -> Duration {
        if self.tokens >= needed {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((needed - self.tokens) / self.refill_per_sec)
        }
    }
}

/// Dual rate limiter shared by every LLM call in the process: one bucket
/// paces requests per minute (burst 1), the other tokens per minute (burst =
/// the full minute budget). The proactive pace is deliberately generous;
/// actual throughput under pressure is governed reactively by provider 429s.
#[derive(Debug)]
pub struct RateGovernor {
    rpm: Mutex<Bucket>,
    tpm: Mutex<Bucket>,
}

impl RateGovernor {
    pub fn new(rpm_limit: u32, tpm_limit: u32) -> Self {
        let rpm_limit = rpm_limit.max(1);
        let tpm_limit = tpm_limit.max(1);
        info!("LLM governor: {rpm_limit} RPM, {tpm_limit} TPM");
        Self {
            rpm: Mutex::new(Bucket::new(1.0, f64::from(rpm_limit) / 60.0)),
            tpm: Mutex::new(Bucket::new(f64::from(tpm_limit), f64::from(tpm_limit) / 60.0)),
        }
    }

    /// Blocks until a request slot is available, then claims it. Must be
    /// called before every provider request. Cancellation surfaces
    /// immediately and claims nothing.
    pub async fn await_request(&self, cancel: &CancellationToken) -> Result<(), LlmError> {
        loop {
            let wait = {
                let mut bucket = self.rpm.lock().await;
                bucket.refill(Instant::now());
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                bucket.wait_for(1.0)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Records `tokens` of actual usage after a response. The debt is taken
    /// unconditionally (the provider already spent it); when the bucket runs
    /// dry this blocks the caller, pacing its next request. Never fails the
    /// response the usage came from.
    pub async fn consume_tokens(&self, cancel: &CancellationToken, tokens: u32) {
        if tokens == 0 {
            return;
        }

        let wait = {
            let mut bucket = self.tpm.lock().await;
            bucket.refill(Instant::now());
            bucket.tokens -= f64::from(tokens);
            bucket.wait_for(0.0)
        };

        if !wait.is_zero() {
            debug!("TPM budget drained, pacing for {:?}", wait);
            tokio::select! {
                _ = cancel.cancelled() => debug!("TPM pacing interrupted by cancellation"),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
