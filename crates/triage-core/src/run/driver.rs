//! Drives one remote run to a terminal outcome.
//!
//! One `execute` call opens a single thread and then works through up to
//! `max_attempts` runs on it:
//!
//! ```text
//! CREATED -> POLLING -> SUCCESS   (outcome, succeeded = true)
//!                    -> FAILURE   (outcome, succeeded = false)
//!                    -> RETRY     (rate limited, attempts left: backoff, new run)
//!                    -> TIMEOUT   (error, whole call aborts)
//! ```
//!
//! A rate-limited failure on the last attempt ends the loop and is reported
//! as [`RunError::RetriesExhausted`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::remote::{RemoteError, RemoteJobService, RunHandle, open_thread};

use super::RunError;
use super::backoff::Backoff;
use super::status::RunStatus;

/// Polling and retry timing shared by every run of a harness pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    /// Wait between two status checks.
    pub poll_interval: Duration,
    /// Deadline for one attempt to reach a terminal status.
    pub timeout: Duration,
    /// Maximum number of runs created per `execute` call.
    pub max_attempts: u32,
    /// First backoff wait after a rate-limited attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any backoff wait.
    pub max_backoff: Duration,
}

impl PollSettings {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(
        poll_interval: Duration,
        timeout: Duration,
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            poll_interval,
            timeout,
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_backoff, self.poll_interval, self.max_backoff)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(2),
            Duration::from_secs(120),
            5,
            Duration::from_secs(7),
            Duration::from_secs(30),
        )
    }
}

/// One invocation of an agent on a message.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub agent_id: String,
    pub message: String,
    pub settings: PollSettings,
}

impl RunRequest {
    pub fn new(agent_id: impl Into<String>, message: impl Into<String>, settings: PollSettings) -> Self {
        Self {
            agent_id: agent_id.into(),
            message: message.into(),
            settings,
        }
    }
}

/// Terminal result of a run that did not error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub thread_id: String,
    pub run_id: String,
    pub status: RunStatus,
    pub last_error: Option<RemoteError>,
    pub succeeded: bool,
    /// Number of runs created, including this one.
    pub attempts: u32,
}

/// Drives runs against a [`RemoteJobService`].
#[derive(Clone)]
pub struct RunDriver {
    service: Arc<dyn RemoteJobService>,
}

impl RunDriver {
    pub fn new(service: Arc<dyn RemoteJobService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn RemoteJobService> {
        &self.service
    }

    /// Run `request` to a terminal outcome, retrying rate-limited runs.
    ///
    /// Returns exactly one of:
    /// - `Ok(outcome)` for a terminal success, or a terminal failure that is
    ///   not rate limited
    /// - [`RunError::Transport`] if any remote call fails
    /// - [`RunError::Timeout`] if an attempt does not finish in time
    /// - [`RunError::RetriesExhausted`] if every attempt was rate limited
    pub async fn execute(&self, request: &RunRequest) -> Result<RunOutcome, RunError> {
        let settings = &request.settings;
        let service = self.service.as_ref();

        let thread = open_thread(service, &request.message)
            .await
            .map_err(RunError::transport("open thread"))?;

        tracing::info!(
            thread_id = %thread.id,
            agent_id = %request.agent_id,
            max_attempts = settings.max_attempts,
            "starting run"
        );

        let mut backoff = settings.backoff();

        for attempt in 1..=settings.max_attempts {
            let run = service
                .create_run(&thread.id, &request.agent_id)
                .await
                .map_err(RunError::transport("create run"))?;

            let (status, last_error) = self.await_terminal(&thread.id, &run, settings).await?;

            if status.is_success() {
                tracing::info!(thread_id = %thread.id, run_id = %run.id, %status, attempt, "run succeeded");
                return Ok(RunOutcome {
                    thread_id: thread.id,
                    run_id: run.id,
                    status,
                    last_error,
                    succeeded: true,
                    attempts: attempt,
                });
            }

            let rate_limited = last_error.as_ref().is_some_and(RemoteError::is_rate_limited);
            if !rate_limited {
                tracing::warn!(
                    thread_id = %thread.id,
                    run_id = %run.id,
                    %status,
                    error = ?last_error,
                    attempt,
                    "run failed"
                );
                return Ok(RunOutcome {
                    thread_id: thread.id,
                    run_id: run.id,
                    status,
                    last_error,
                    succeeded: false,
                    attempts: attempt,
                });
            }

            if attempt < settings.max_attempts {
                let wait = backoff.next_delay();
                tracing::warn!(
                    run_id = %run.id,
                    attempt,
                    wait_secs = wait.as_secs_f64(),
                    "run attempt failed due to rate limit; retrying"
                );
                tokio::time::sleep(wait).await;
            } else {
                tracing::warn!(run_id = %run.id, attempt, "run attempt failed due to rate limit; no attempts left");
            }
        }

        Err(RunError::RetriesExhausted {
            attempts: settings.max_attempts,
        })
    }

    /// Poll `run` until it reaches a terminal status or the deadline passes.
    async fn await_terminal(
        &self,
        thread_id: &str,
        run: &RunHandle,
        settings: &PollSettings,
    ) -> Result<(RunStatus, Option<RemoteError>), RunError> {
        // A timeout past the clock's range means no deadline.
        let deadline = Instant::now().checked_add(settings.timeout);
        let mut last_status: Option<RunStatus> = None;

        while deadline.is_none_or(|deadline| Instant::now() < deadline) {
            let snapshot = self
                .service
                .get_run(thread_id, &run.id)
                .await
                .map_err(RunError::transport("fetch run status"))?;

            if let Some(raw) = snapshot.status.as_deref() {
                let status = RunStatus::parse(raw);
                tracing::info!(run_id = %run.id, %status, "status");
                if status.is_terminal() {
                    return Ok((status, snapshot.last_error));
                }
                last_status = Some(status);
            }

            tokio::time::sleep(settings.poll_interval).await;
        }

        Err(RunError::Timeout {
            run_id: run.id.clone(),
            last_status: last_status.map(|s| s.to_string()),
        })
    }
}

impl std::fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDriver").finish_non_exhaustive()
    }
}
