//! Waiting on remote long-running jobs.
//!
//! A [`CompletionSource`] knows how to read a job's status and fetch its final
//! payload; the [`CompletionPoller`] drives it with bounded attempts and a
//! capped backoff, and stops as soon as the owning request is cancelled.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status reading. `snapshot` is handed to the fetch step on completion.
#[derive(Debug, Clone)]
pub struct Observation<S> {
    pub status: JobStatus,
    /// Remote-provided explanation, used for failed or cancelled jobs.
    pub reason: Option<String>,
    pub snapshot: S,
}

impl<S> Observation<S> {
    pub const fn new(status: JobStatus, snapshot: S) -> Self {
        Self {
            status,
            reason: None,
            snapshot,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Remote job that can be polled to completion.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    type Snapshot: Send;
    type Output: Send;

    /// Human-readable label used in diagnostics, e.g. `genie message`.
    fn operation(&self) -> &str {
        "remote job"
    }

    /// # Errors
    /// Transient failures are retried by the poller while attempts remain.
    async fn poll_status(&self, job_id: &str) -> Result<Observation<Self::Snapshot>, ToolError>;

    /// # Errors
    /// Any failure fetching the final payload ends the wait.
    async fn fetch_result(
        &self,
        job_id: &str,
        snapshot: Self::Snapshot,
    ) -> Result<Self::Output, ToolError>;
}

/// Attempt budget and backoff between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    /// Growth factor per attempt; `1` keeps a fixed interval.
    pub multiplier: u32,
    pub max_attempts: u32,
}

impl PollPolicy {
    #[must_use]
    pub const fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_interval: interval,
            multiplier: 1,
            max_attempts,
        }
    }

    #[must_use]
    pub const fn with_backoff(mut self, multiplier: u32, max_interval: Duration) -> Self {
        self.multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay after the given (1-based) attempt, never above `max_interval`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        let ceiling = self.max_interval.max(self.interval);
        self.interval.saturating_mul(factor).min(ceiling)
    }

    const fn attempt_budget(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1), 60).with_backoff(2, Duration::from_secs(10))
    }
}

/// Transient record of one in-flight wait.
#[derive(Debug, Clone)]
pub struct PollState {
    pub job_id: String,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub started_at: Instant,
}

impl PollState {
    fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
            attempt_count: 0,
            started_at: Instant::now(),
        }
    }
}

/// Drives a [`CompletionSource`] until a terminal status or the attempt budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionPoller {
    policy: PollPolicy,
}

impl CompletionPoller {
    #[must_use]
    pub const fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Polls `job_id` until it completes, fails, or the budget runs out.
    ///
    /// Transient status-read failures consume an attempt and the loop carries
    /// on; permanent ones end the wait. Cancellation is observed while a status
    /// read is outstanding, during every sleep, and on every wake-up.
    ///
    /// # Errors
    /// `RemoteService` for failed, cancelled or expired jobs, `Timeout` with the
    /// last observed status when attempts run out, `Cancelled` when `cancel`
    /// fires, or whatever the source returns.
    pub async fn await_completion<S>(
        &self,
        source: &S,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<S::Output, ToolError>
    where
        S: CompletionSource + ?Sized,
    {
        let operation = source.operation().to_string();
        let budget = self.policy.attempt_budget();
        let mut state = PollState::new(job_id);

        loop {
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled(format!("{operation} {job_id}")));
            }

            state.attempt_count += 1;
            let observed = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(ToolError::Cancelled(format!("{operation} {job_id}")));
                }
                observed = source.poll_status(job_id) => observed,
            };

            match observed {
                Ok(observation) => {
                    state.status = observation.status;
                    debug!(
                        job_id,
                        attempt = state.attempt_count,
                        status = %observation.status,
                        "polled job status"
                    );
                    match observation.status {
                        JobStatus::Completed => {
                            debug!(
                                job_id,
                                attempts = state.attempt_count,
                                elapsed_ms = u64::try_from(state.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                                "job completed"
                            );
                            return source.fetch_result(job_id, observation.snapshot).await;
                        }
                        JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired => {
                            let reason = observation
                                .reason
                                .unwrap_or_else(|| "no reason given".to_string());
                            return Err(ToolError::remote_permanent(format!(
                                "{operation} {job_id} ended with status {}: {reason}",
                                observation.status
                            )));
                        }
                        JobStatus::Pending | JobStatus::Running => {}
                    }
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        job_id,
                        attempt = state.attempt_count,
                        error = %err,
                        "transient failure reading job status"
                    );
                }
                Err(err) => return Err(err),
            }

            if state.attempt_count >= budget {
                return Err(ToolError::Timeout {
                    operation: format!("{operation} {job_id}"),
                    attempts: state.attempt_count,
                    last_status: state.status.to_string(),
                });
            }

            let delay = self.policy.delay_after(state.attempt_count);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(ToolError::Cancelled(format!("{operation} {job_id}")));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
