//! Completion waiter for edit runs.
//!
//! States: waiting → complete | failed | timed out (or cancelled).
//!
//! Each attempt first suspends for the current delay, then reads the status
//! once. `pending` and `running` keep waiting; `complete` yields the schema;
//! any other status fails immediately without another poll. Transport and
//! non-success errors are propagated as-is, never retried here.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{ExtractionService, JobStatus, RunId};
use crate::error::ExtendError;
use crate::events::{EventEmitter, PipelineEvent};
use crate::schema::ExtractionResult;

/// How often and how long to wait for an edit run.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first status check (and between checks at factor 1.0)
    pub interval: Duration,
    /// Status checks before giving up with [`ExtendError::Timeout`]
    pub max_attempts: u32,
    /// Growth per attempt. 1.0 keeps the delay fixed.
    pub backoff_factor: f64,
    /// Cap for the grown delay
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    /// 60 checks, 5 seconds apart: five minutes in total.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5), 60)
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_factor: 1.0,
            max_interval: interval,
        }
    }

    pub fn exponential(
        interval: Duration,
        max_attempts: u32,
        factor: f64,
        max_interval: Duration,
    ) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_factor: factor,
            max_interval,
        }
    }

    /// Delay before the given 0-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff_factor.is_nan() || self.backoff_factor <= 1.0 {
            return self.interval;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown = self.interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = grown.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(self.interval.as_secs_f64()))
    }
}

/// Poll `run_id` until the run completes, fails, times out or is cancelled.
pub async fn wait_for_completion(
    service: &dyn ExtractionService,
    run_id: &RunId,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    emitter: &dyn EventEmitter,
) -> Result<ExtractionResult, ExtendError> {
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!(run_id = %run_id, attempt, "Polling cancelled");
                return Err(ExtendError::Cancelled);
            }

            _ = tokio::time::sleep(delay) => {}
        }

        let snapshot = service.poll_once(run_id).await?;
        let checks = attempt + 1;

        emitter.emit(PipelineEvent::StatusChecked {
            run_id: run_id.to_string(),
            attempt: checks,
            status: snapshot.status.as_str().to_string(),
        });

        match snapshot.status {
            JobStatus::Pending | JobStatus::Running => {
                tracing::debug!(
                    run_id = %run_id,
                    attempt = checks,
                    status = snapshot.status.as_str(),
                    "Edit run still in progress"
                );
            }
            JobStatus::Complete => {
                tracing::info!(run_id = %run_id, checks, "Edit run complete");
                return snapshot
                    .output_schema
                    .and_then(ExtractionResult::from_value)
                    .ok_or_else(|| ExtendError::MissingOutput {
                        run_id: run_id.to_string(),
                    });
            }
            JobStatus::Failed(status) => {
                tracing::warn!(run_id = %run_id, status = %status, "Edit run failed");
                return Err(ExtendError::JobFailed { status });
            }
        }
    }

    tracing::warn!(
        run_id = %run_id,
        attempts = policy.max_attempts,
        "Gave up waiting for edit run"
    );
    Err(ExtendError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::events::{ChannelEmitter, NoOpEmitter};
    use crate::extend::{FileId, RunSnapshot};

    /// Replays a scripted status sequence and counts status checks.
    struct ScriptedRun {
        statuses: Mutex<VecDeque<Result<RunSnapshot, ExtendError>>>,
        polls: AtomicU32,
    }

    impl ScriptedRun {
        fn new(statuses: &[&str], payload: Option<serde_json::Value>) -> Self {
            let last = statuses.len().saturating_sub(1);
            let script = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    Ok(RunSnapshot {
                        status: JobStatus::parse(Some(*s)),
                        output_schema: if i == last { payload.clone() } else { None },
                    })
                })
                .collect();
            Self::from_script(script)
        }

        fn from_script(script: VecDeque<Result<RunSnapshot, ExtendError>>) -> Self {
            Self {
                statuses: Mutex::new(script),
                polls: AtomicU32::new(0),
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionService for ScriptedRun {
        async fn submit(&self, _bytes: Bytes, _file_name: &str) -> Result<FileId, ExtendError> {
            unreachable!("poll tests never upload")
        }

        async fn start_job(&self, _file_id: &FileId) -> Result<RunId, ExtendError> {
            unreachable!("poll tests never start jobs")
        }

        async fn poll_once(&self, _run_id: &RunId) -> Result<RunSnapshot, ExtendError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            // Once the script runs out the run stays "running" forever
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(RunSnapshot {
                        status: JobStatus::Running,
                        output_schema: None,
                    })
                })
        }
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(1), max_attempts)
    }

    async fn wait(service: &ScriptedRun, policy: &PollPolicy) -> Result<ExtractionResult, ExtendError> {
        wait_for_completion(
            service,
            &RunId::new("run_1"),
            policy,
            &CancellationToken::new(),
            &NoOpEmitter,
        )
        .await
    }

    #[tokio::test]
    async fn test_complete_returns_payload() {
        let run = ScriptedRun::new(&["pending", "running", "complete"], Some(json!({"a": 1, "b": 2})));

        let result = wait(&run, &fast_policy(10)).await.unwrap();

        assert_eq!(result.field_count(), 2);
        assert_eq!(result.schema()["a"], 1);
        assert_eq!(run.polls(), 3);
    }

    #[tokio::test]
    async fn test_all_running_times_out() {
        let run = ScriptedRun::new(&[], None);

        let err = wait(&run, &fast_policy(4)).await.unwrap_err();

        assert!(matches!(err, ExtendError::Timeout { attempts: 4 }));
        assert!(!err.is_remote_failure());
        assert_eq!(run.polls(), 4);
    }

    #[tokio::test]
    async fn test_unknown_status_fails_immediately() {
        let run = ScriptedRun::new(&["pending", "weird-status", "complete"], Some(json!({"a": 1})));

        let err = wait(&run, &fast_policy(10)).await.unwrap_err();

        assert!(matches!(err, ExtendError::JobFailed { ref status } if status == "weird-status"));
        assert_eq!(run.polls(), 2);
    }

    #[tokio::test]
    async fn test_remote_failed_status() {
        let run = ScriptedRun::new(&["running", "failed"], None);

        let err = wait(&run, &fast_policy(10)).await.unwrap_err();

        assert!(err.is_remote_failure());
        assert_eq!(err.to_string(), "edit run failed with status: failed");
    }

    #[tokio::test]
    async fn test_poll_error_is_not_retried() {
        let mut script = VecDeque::new();
        script.push_back(Ok(RunSnapshot {
            status: JobStatus::Pending,
            output_schema: None,
        }));
        script.push_back(Err(ExtendError::Poll {
            status: 500,
            body: "boom".to_string(),
        }));
        let run = ScriptedRun::from_script(script);

        let err = wait(&run, &fast_policy(10)).await.unwrap_err();

        assert!(matches!(err, ExtendError::Poll { status: 500, .. }));
        assert_eq!(run.polls(), 2);
    }

    #[tokio::test]
    async fn test_complete_without_schema() {
        let run = ScriptedRun::new(&["complete"], None);

        let err = wait(&run, &fast_policy(3)).await.unwrap_err();

        assert!(matches!(err, ExtendError::MissingOutput { ref run_id } if run_id == "run_1"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let run = ScriptedRun::new(&["complete"], Some(json!({"a": 1})));
        let cancel = CancellationToken::new();
        let policy = PollPolicy::fixed(Duration::from_secs(60), 5);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = wait_for_completion(&run, &RunId::new("run_1"), &policy, &cancel, &NoOpEmitter)
            .await
            .unwrap_err();

        assert!(matches!(err, ExtendError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(run.polls(), 0);
    }

    #[tokio::test]
    async fn test_status_events() {
        let run = ScriptedRun::new(&["pending", "complete"], Some(json!({"a": 1})));
        let (emitter, mut rx) = ChannelEmitter::new(16);

        wait_for_completion(
            &run,
            &RunId::new("run_1"),
            &fast_policy(5),
            &CancellationToken::new(),
            &emitter,
        )
        .await
        .unwrap();

        let mut seen = Vec::new();
        while let Ok(PipelineEvent::StatusChecked { attempt, status, .. }) = rx.try_recv() {
            seen.push((attempt, status));
        }
        assert_eq!(
            seen,
            vec![(1, "pending".to_string()), (2, "complete".to_string())]
        );
    }

    #[test]
    fn test_fixed_delay() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(59), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy =
            PollPolicy::exponential(Duration::from_secs(1), 20, 2.0, Duration::from_secs(10));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_shared_service_across_tasks() {
        let run = Arc::new(ScriptedRun::new(&["complete"], Some(json!({"x": 1}))));
        let handle = {
            let run = run.clone();
            tokio::spawn(async move { wait(&run, &fast_policy(2)).await.map(|r| r.field_count()) })
        };
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }
}
