//! Integration tests for the run driver.
//!
//! Runs against a [`ScriptedService`] with tokio's clock paused, so poll and
//! backoff sleeps complete instantly while elapsed time stays exact.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use triage_core::run::{PollSettings, RunDriver, RunError, RunRequest, RunStatus};
use triage_test_utils::{Operation, RunScript, ScriptedService};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

/// poll 1s, timeout 30s, initial backoff 7s, max backoff 30s.
fn settings(max_attempts: u32) -> PollSettings {
    PollSettings::new(secs(1.0), secs(30.0), max_attempts, secs(7.0), secs(30.0))
}

fn driver_for(service: &Arc<ScriptedService>) -> RunDriver {
    RunDriver::new(service.clone())
}

fn request(settings: PollSettings) -> RunRequest {
    RunRequest::new("asst_triage", "VPN outage affecting finance team", settings)
}

// ---------------------------------------------------------------------------
// Terminal outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completes_after_pending_statuses() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::completes_with(
        "Priority: High",
    )]));

    let outcome = driver_for(&service).execute(&request(settings(3))).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.last_error, None);
    assert_eq!(service.runs_created(), 1);
    assert_eq!(service.threads_created(), 1);
    assert_eq!(service.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn user_message_is_posted_once() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::completes_with("ok")]));

    let outcome = driver_for(&service).execute(&request(settings(3))).await.unwrap();

    let messages = service.messages(&outcome.thread_id);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].role, "assistant");
}

#[tokio::test(start_paused = true)]
async fn qualified_status_names_are_understood() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::statuses(&[
        "RunStatus.QUEUED",
        "RunStatus.SUCCEEDED",
    ])]));

    let outcome = driver_for(&service).execute(&request(settings(1))).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.status, RunStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn non_rate_limited_failure_is_reported_without_retry() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::fails_with("invalid_request", "model not found"),
        RunScript::completes_with("never reached"),
    ]));

    let outcome = driver_for(&service).execute(&request(settings(5))).await.unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(
        outcome.last_error.as_ref().and_then(|e| e.code.as_deref()),
        Some("invalid_request")
    );
    assert_eq!(service.runs_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_without_error_payload_is_not_retried() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::statuses(&["failed"])]));

    let outcome = driver_for(&service).execute(&request(settings(5))).await.unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.last_error, None);
    assert_eq!(service.runs_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn canceled_run_is_a_failed_outcome() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::statuses(&[
        "in_progress",
        "cancelling",
        "cancelled",
    ])]));

    let outcome = driver_for(&service).execute(&request(settings(2))).await.unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.status, RunStatus::Canceled);
}

// ---------------------------------------------------------------------------
// Rate-limit retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rate_limited_run_is_retried_on_the_same_thread() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::statuses(&["completed"]),
    ]));
    let start = Instant::now();

    let outcome = driver_for(&service).execute(&request(settings(3))).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(service.runs_created(), 2);
    assert_eq!(service.threads_created(), 1);

    let runs = service.created_runs();
    assert_eq!(runs[0].thread_id, runs[1].thread_id);
    assert_ne!(runs[0].run_id, runs[1].run_id);
    assert_eq!(outcome.run_id, runs[1].run_id);

    // Exactly one backoff wait of max(7s, 2 * 1s).
    assert_eq!(start.elapsed(), secs(7.0));
}

#[tokio::test(start_paused = true)]
async fn all_attempts_rate_limited_exhausts_retries() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::rate_limited(),
        RunScript::completes_with("never reached"),
    ]));
    let start = Instant::now();

    let err = driver_for(&service)
        .execute(&request(settings(2)))
        .await
        .unwrap_err();

    assert!(
        matches!(err, RunError::RetriesExhausted { attempts: 2 }),
        "unexpected error: {err}"
    );
    assert_eq!(service.runs_created(), 2);
    // No backoff after the final attempt.
    assert_eq!(start.elapsed(), secs(7.0));
}

#[tokio::test(start_paused = true)]
async fn single_attempt_rate_limited_exhausts_immediately() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::rate_limited()]));
    let start = Instant::now();

    let err = driver_for(&service)
        .execute(&request(settings(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::RetriesExhausted { attempts: 1 }));
    assert_eq!(service.runs_created(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_detected_from_message_text() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::fails_with("server_error", "Rate Limit hit, slow down"),
        RunScript::statuses(&["completed"]),
    ]));

    let outcome = driver_for(&service).execute(&request(settings(2))).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(service.runs_created(), 2);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_between_attempts() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::rate_limited(),
        RunScript::rate_limited(),
        RunScript::statuses(&["completed"]),
    ]));
    // Floor is 2 * poll = 2s; waits are 2s, 3s, 4.5s.
    let settings = PollSettings::new(secs(1.0), secs(30.0), 4, secs(1.0), secs(10.0));
    let start = Instant::now();

    let outcome = driver_for(&service).execute(&request(settings)).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(start.elapsed(), secs(9.5));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped_at_max() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::rate_limited(),
        RunScript::statuses(&["completed"]),
    ]));
    let settings = PollSettings::new(secs(1.0), secs(30.0), 3, secs(12.0), secs(10.0));
    let start = Instant::now();

    driver_for(&service).execute(&request(settings)).await.unwrap();

    assert_eq!(start.elapsed(), secs(20.0));
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stuck_run_times_out() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::stuck("in_progress")]));
    let settings = PollSettings::new(secs(1.0), secs(5.0), 3, secs(7.0), secs(30.0));

    let err = driver_for(&service).execute(&request(settings)).await.unwrap_err();

    match err {
        RunError::Timeout {
            ref run_id,
            ref last_status,
        } => {
            assert_eq!(run_id, "run_3");
            assert_eq!(last_status.as_deref(), Some("in_progress"));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(service.polls(), 5);
    assert_eq!(service.runs_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_status_keeps_polling_until_timeout() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript {
        statuses: vec![None],
        last_error: None,
        reply: None,
    }]));
    let settings = PollSettings::new(secs(2.0), secs(6.0), 1, secs(1.0), secs(1.0));

    let err = driver_for(&service).execute(&request(settings)).await.unwrap_err();

    assert!(
        matches!(err, RunError::Timeout { last_status: None, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(service.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_after_rate_limit_aborts_remaining_attempts() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::stuck("queued"),
        RunScript::completes_with("never reached"),
    ]));
    let settings = PollSettings::new(secs(1.0), secs(3.0), 5, secs(2.0), secs(2.0));

    let err = driver_for(&service).execute(&request(settings)).await.unwrap_err();

    assert!(matches!(err, RunError::Timeout { .. }), "unexpected error: {err}");
    assert_eq!(service.runs_created(), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_beyond_clock_range_waits_without_deadline() {
    let service = Arc::new(ScriptedService::with_scripts([
        RunScript::rate_limited(),
        RunScript::completes_with("Priority: High"),
    ]));
    let settings = PollSettings::new(secs(1.0), secs(1e19), 3, secs(30.0), Duration::MAX);

    let outcome = driver_for(&service).execute(&request(settings)).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(service.runs_created(), 2);
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn thread_creation_failure_propagates() {
    let service = Arc::new(ScriptedService::new());
    service.fail_on(Operation::CreateThread, "connection refused");

    let err = driver_for(&service)
        .execute(&request(settings(3)))
        .await
        .unwrap_err();

    match &err {
        RunError::Transport { operation, .. } => assert_eq!(*operation, "open thread"),
        other => panic!("expected transport error, got {other}"),
    }
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(service.runs_created(), 0);
}

#[tokio::test(start_paused = true)]
async fn message_creation_failure_propagates() {
    let service = Arc::new(ScriptedService::new());
    service.fail_on(Operation::AppendMessage, "payload too large");

    let err = driver_for(&service)
        .execute(&request(settings(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Transport { operation: "open thread", .. }));
    assert!(err.to_string().contains("payload too large"));
    assert_eq!(service.runs_created(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_creation_failure_is_not_retried() {
    let service = Arc::new(ScriptedService::new());
    service.fail_on(Operation::CreateRun, "503 Service Unavailable");

    let err = driver_for(&service)
        .execute(&request(settings(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Transport { operation: "create run", .. }));
    assert_eq!(service.threads_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_fetch_failure_propagates() {
    let service = Arc::new(ScriptedService::with_scripts([RunScript::completes_with("x")]));
    service.fail_on(Operation::GetRun, "connection reset");

    let err = driver_for(&service)
        .execute(&request(settings(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Transport { operation: "fetch run status", .. }));
    assert_eq!(service.runs_created(), 1);
}
