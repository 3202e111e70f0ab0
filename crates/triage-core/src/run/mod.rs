//! Run polling: status normalization, retry backoff, and the run driver.

pub mod backoff;
pub mod driver;
pub mod status;

pub use backoff::Backoff;
pub use driver::{PollSettings, RunDriver, RunOutcome, RunRequest};
pub use status::{RunStatus, StatusCategory, normalize_status};

/// Errors that abort a [`RunDriver::execute`] call.
///
/// A run that finishes unsuccessfully is not an error; it is reported as a
/// [`RunOutcome`] with `succeeded = false`.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A call to the remote service itself failed. Never retried.
    #[error("failed to {operation}: {error:#}")]
    Transport {
        operation: &'static str,
        error: anyhow::Error,
    },

    /// No terminal status was observed before the attempt deadline.
    #[error(
        "timed out waiting for run {run_id} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        run_id: String,
        last_status: Option<String>,
    },

    /// Every attempt ended rate limited.
    #[error("exceeded {attempts} run attempts due to repeated rate limiting")]
    RetriesExhausted { attempts: u32 },
}

impl RunError {
    /// Adapter for `map_err` on remote calls.
    pub(crate) fn transport(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self::Transport { operation, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_includes_last_status() {
        let err = RunError::Timeout {
            run_id: "run_1".into(),
            last_status: Some("in_progress".into()),
        };
        assert_eq!(
            err.to_string(),
            "timed out waiting for run run_1 (last status: in_progress)"
        );
    }

    #[test]
    fn timeout_message_without_status() {
        let err = RunError::Timeout {
            run_id: "run_1".into(),
            last_status: None,
        };
        assert!(err.to_string().ends_with("(last status: unknown)"));
    }

    #[test]
    fn transport_message_keeps_cause_chain() {
        let cause = anyhow::anyhow!("connection reset").context("create run: request failed");
        let err = RunError::transport("create run")(cause);
        assert_eq!(
            err.to_string(),
            "failed to create run: create run: request failed: connection reset"
        );
    }
}
