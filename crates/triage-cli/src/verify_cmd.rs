//! `triage verify` command: run one ticket through one agent and report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use triage_core::remote::RemoteJobService;
use triage_core::run::{PollSettings, RunDriver, RunError, RunOutcome, RunRequest};
use triage_core::transcript;

/// Options for the verify command.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub agent_id: String,
    pub ticket: String,
    pub settings: PollSettings,
    pub show_transcript: bool,
    pub json: bool,
}

/// Build poll settings from CLI seconds. Every duration must be positive.
pub fn poll_settings(
    poll_interval: f64,
    timeout: f64,
    max_attempts: u32,
    initial_backoff: f64,
    max_backoff: f64,
) -> Result<PollSettings> {
    fn positive(name: &str, secs: f64) -> Result<Duration> {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--{name} must be a positive number of seconds, got {secs}");
        }
        Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("--{name} is too large, got {secs}"))
    }

    Ok(PollSettings::new(
        positive("poll-interval", poll_interval)?,
        positive("timeout", timeout)?,
        max_attempts,
        positive("initial-backoff", initial_backoff)?,
        positive("max-backoff", max_backoff)?,
    ))
}

/// Exit code reported for a driver error.
pub fn exit_code(err: &RunError) -> i32 {
    match err {
        RunError::Transport { .. } => 1,
        RunError::Timeout { .. } => 3,
        RunError::RetriesExhausted { .. } => 4,
    }
}

/// Human-readable summary of an outcome.
pub fn render_outcome(outcome: &RunOutcome, endpoint: &str) -> Vec<String> {
    let mut lines = vec![
        format!("Project endpoint: {endpoint}"),
        format!("Thread: {}", outcome.thread_id),
        format!("Run:    {} (attempt {})", outcome.run_id, outcome.attempts),
        format!("Status: {}", outcome.status),
    ];
    if let Some(err) = &outcome.last_error {
        lines.push(format!("Error:  {err}"));
    }
    lines
}

/// JSON summary of an outcome.
pub fn outcome_json(outcome: &RunOutcome, endpoint: &str) -> serde_json::Value {
    serde_json::json!({
        "project_endpoint": endpoint,
        "thread_id": outcome.thread_id,
        "run_id": outcome.run_id,
        "status": outcome.status,
        "succeeded": outcome.succeeded,
        "attempts": outcome.attempts,
        "last_error": outcome.last_error,
    })
}

/// Run the verify command.
///
/// Exits with 2 when the run finished without succeeding, 3 on timeout and
/// 4 when every attempt was rate limited. Transport failures are returned.
pub async fn run_verify(service: Arc<dyn RemoteJobService>, endpoint: &str, options: &VerifyOptions) -> Result<()> {
    let driver = RunDriver::new(service.clone());
    let request = RunRequest::new(&options.agent_id, &options.ticket, options.settings);

    let outcome = match driver.execute(&request).await {
        Ok(outcome) => outcome,
        Err(err @ RunError::Transport { .. }) => return Err(err.into()),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(exit_code(&err));
        }
    };

    if options.json {
        let mut body = outcome_json(&outcome, endpoint);
        if options.show_transcript {
            body["transcript"] = match transcript::fetch_transcript(service.as_ref(), &outcome.thread_id).await {
                Ok(lines) => serde_json::json!(lines),
                Err(e) => {
                    eprintln!("{e:#}");
                    serde_json::Value::Null
                }
            };
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for line in render_outcome(&outcome, endpoint) {
            println!("{line}");
        }
        if options.show_transcript {
            match transcript::fetch_transcript(service.as_ref(), &outcome.thread_id).await {
                Ok(lines) => {
                    println!();
                    println!("Transcript:");
                    for line in lines {
                        println!("  {line}");
                    }
                }
                Err(e) => eprintln!("{e:#}"),
            }
        }
    }

    if !outcome.succeeded {
        eprintln!("run {} finished with status {}", outcome.run_id, outcome.status);
        std::process::exit(2);
    }
    Ok(())
}
