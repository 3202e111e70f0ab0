//! The service traits that the run driver and harness are written against.
//!
//! [`RemoteJobService`] covers the thread/message/run operations;
//! [`AgentProvisioner`] covers agent creation. Both are object-safe so a
//! single client can be shared as `Arc<dyn RemoteJobService>` and swapped
//! for an in-memory fake in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::types::{
    AgentHandle, AgentSpec, MessageRole, RunHandle, RunSnapshot, ThreadHandle, ThreadMessage,
};

/// Thread, message and run operations of the remote agents service.
#[async_trait]
pub trait RemoteJobService: Send + Sync {
    /// Create an empty thread.
    async fn create_thread(&self) -> Result<ThreadHandle>;

    /// Append a message to a thread.
    async fn append_message(&self, thread_id: &str, role: MessageRole, text: &str) -> Result<()>;

    /// Start a run of `agent_id` over the thread's messages.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunHandle>;

    /// Fetch the current status of a run.
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot>;

    /// List every message on a thread, oldest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

/// Agent creation.
#[async_trait]
pub trait AgentProvisioner: Send + Sync {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle>;
}

// Compile-time assertion: both traits must stay object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn RemoteJobService, _: &dyn AgentProvisioner) {}
};

/// Create a thread holding a single user message.
pub async fn open_thread(service: &dyn RemoteJobService, text: &str) -> Result<ThreadHandle> {
    let thread = service
        .create_thread()
        .await
        .context("failed to create thread")?;
    service
        .append_message(&thread.id, MessageRole::User, text)
        .await
        .with_context(|| format!("failed to create message on thread {}", thread.id))?;
    Ok(thread)
}

/// Create a thread with one user message and start a run on it.
///
/// Does not wait for the run; callers poll it separately (or not at all).
pub async fn create_thread_and_run(
    service: &dyn RemoteJobService,
    agent_id: &str,
    text: &str,
) -> Result<(ThreadHandle, RunHandle)> {
    let thread = open_thread(service, text).await?;
    let run = service
        .create_run(&thread.id, agent_id)
        .await
        .with_context(|| format!("failed to create run on thread {}", thread.id))?;
    tracing::info!(thread_id = %thread.id, run_id = %run.id, agent_id, "run submitted");
    Ok((thread, run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls; optionally fails message creation.
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
        fail_messages: bool,
    }

    #[async_trait]
    impl RemoteJobService for RecordingService {
        async fn create_thread(&self) -> Result<ThreadHandle> {
            self.calls.lock().unwrap().push("create_thread".into());
            Ok(ThreadHandle { id: "t1".into() })
        }

        async fn append_message(&self, thread_id: &str, role: MessageRole, text: &str) -> Result<()> {
            if self.fail_messages {
                anyhow::bail!("service unavailable");
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("append_message {thread_id} {role} {text}"));
            Ok(())
        }

        async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunHandle> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create_run {thread_id} {agent_id}"));
            Ok(RunHandle { id: "r1".into() })
        }

        async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
            Ok(RunSnapshot {
                id: run_id.into(),
                status: None,
                last_error: None,
            })
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn create_thread_and_run_issues_calls_in_order() {
        let service = RecordingService::default();
        let (thread, run) = create_thread_and_run(&service, "asst_triage", "VPN down")
            .await
            .unwrap();
        assert_eq!(thread.id, "t1");
        assert_eq!(run.id, "r1");
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec![
                "create_thread".to_string(),
                "append_message t1 user VPN down".to_string(),
                "create_run t1 asst_triage".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn open_thread_propagates_message_failure() {
        let service = RecordingService {
            fail_messages: true,
            ..Default::default()
        };
        let err = open_thread(&service, "hello").await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("failed to create message"), "unexpected: {msg}");
        assert!(msg.contains("service unavailable"), "unexpected: {msg}");
    }
}
