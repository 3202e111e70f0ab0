//! Shared test utilities for triage integration tests.
//!
//! Provides [`ScriptedService`], an in-memory [`RemoteJobService`] whose
//! runs follow scripted status sequences. Each created run takes the next
//! [`RunScript`] from a queue; each `get_run` call advances that run one
//! step through its statuses (the last status repeats forever).
//!
//! Threads and messages are kept in memory so transcripts can be read back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use triage_core::remote::{
    MessageRole, RemoteError, RemoteJobService, RunHandle, RunSnapshot, ThreadHandle,
    ThreadMessage,
};
use triage_core::run::RunStatus;

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// How one run behaves when polled.
#[derive(Debug, Clone, PartialEq)]
pub struct RunScript {
    /// Status reported by successive polls; `None` means no status field.
    pub statuses: Vec<Option<String>>,
    /// Error reported once the run is in a terminal failure status.
    pub last_error: Option<RemoteError>,
    /// Assistant message appended to the thread when the run succeeds.
    pub reply: Option<String>,
}

impl RunScript {
    pub fn statuses(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| Some((*s).to_string())).collect(),
            last_error: None,
            reply: None,
        }
    }

    /// `queued -> in_progress -> completed`, then the assistant replies.
    pub fn completes_with(reply: &str) -> Self {
        Self::statuses(&["queued", "in_progress", "completed"]).with_reply(reply)
    }

    /// Fails immediately with a `rate_limit_exceeded` error.
    pub fn rate_limited() -> Self {
        Self::statuses(&["failed"]).with_error(RemoteError::new(
            Some("rate_limit_exceeded"),
            Some("Rate limit is exceeded. Try again in 20 seconds."),
        ))
    }

    /// Fails immediately with the given error.
    pub fn fails_with(code: &str, message: &str) -> Self {
        Self::statuses(&["failed"]).with_error(RemoteError::new(Some(code), Some(message)))
    }

    /// Never leaves `status`.
    pub fn stuck(status: &str) -> Self {
        Self::statuses(&[status])
    }

    pub fn with_error(mut self, error: RemoteError) -> Self {
        self.last_error = Some(error);
        self
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    fn status_at(&self, poll: usize) -> Option<String> {
        self.statuses
            .get(poll)
            .or_else(|| self.statuses.last())
            .cloned()
            .flatten()
    }
}

/// A remote operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateThread,
    AppendMessage,
    CreateRun,
    GetRun,
    ListMessages,
}

/// A run created through the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRun {
    pub thread_id: String,
    pub run_id: String,
    pub agent_id: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

struct ActiveRun {
    thread_id: String,
    script: RunScript,
    polls: usize,
    replied: bool,
}

#[derive(Default)]
struct State {
    next_id: usize,
    threads: HashMap<String, Vec<ThreadMessage>>,
    threads_created: usize,
    scripts: VecDeque<RunScript>,
    runs: HashMap<String, ActiveRun>,
    created_runs: Vec<CreatedRun>,
    polls: usize,
    failures: HashMap<Operation, String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn check(&self, operation: Operation) -> Result<()> {
        match self.failures.get(&operation) {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

/// In-memory, scripted [`RemoteJobService`].
#[derive(Default)]
pub struct ScriptedService {
    state: Mutex<State>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service whose runs follow `scripts` in order.
    ///
    /// Runs created after the queue is empty complete immediately without
    /// a reply.
    pub fn with_scripts(scripts: impl IntoIterator<Item = RunScript>) -> Self {
        let service = Self::new();
        service.lock().scripts.extend(scripts);
        service
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("scripted service state poisoned")
    }

    pub fn push_script(&self, script: RunScript) {
        self.lock().scripts.push_back(script);
    }

    /// Make every call of `operation` fail with `message`.
    pub fn fail_on(&self, operation: Operation, message: &str) {
        self.lock().failures.insert(operation, message.to_string());
    }

    /// Create a thread holding `messages` (for transcript tests).
    pub fn seed_thread(&self, thread_id: &str, messages: Vec<ThreadMessage>) {
        self.lock().threads.insert(thread_id.to_string(), messages);
    }

    pub fn threads_created(&self) -> usize {
        self.lock().threads_created
    }

    pub fn runs_created(&self) -> usize {
        self.lock().created_runs.len()
    }

    pub fn created_runs(&self) -> Vec<CreatedRun> {
        self.lock().created_runs.clone()
    }

    /// Total number of `get_run` calls.
    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    pub fn messages(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.lock().threads.get(thread_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RemoteJobService for ScriptedService {
    async fn create_thread(&self) -> Result<ThreadHandle> {
        let mut state = self.lock();
        state.check(Operation::CreateThread)?;
        let id = state.next_id("thread");
        state.threads.insert(id.clone(), Vec::new());
        state.threads_created += 1;
        Ok(ThreadHandle { id })
    }

    async fn append_message(&self, thread_id: &str, role: MessageRole, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.check(Operation::AppendMessage)?;
        let id = state.next_id("msg");
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;
        thread.push(ThreadMessage::text(id, role.as_str(), text));
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunHandle> {
        let mut state = self.lock();
        state.check(Operation::CreateRun)?;
        if !state.threads.contains_key(thread_id) {
            return Err(anyhow!("thread {thread_id} not found"));
        }
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| RunScript::statuses(&["completed"]));
        let run_id = state.next_id("run");
        state.runs.insert(
            run_id.clone(),
            ActiveRun {
                thread_id: thread_id.to_string(),
                script,
                polls: 0,
                replied: false,
            },
        );
        state.created_runs.push(CreatedRun {
            thread_id: thread_id.to_string(),
            run_id: run_id.clone(),
            agent_id: agent_id.to_string(),
        });
        Ok(RunHandle { id: run_id })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let mut state = self.lock();
        state.check(Operation::GetRun)?;
        state.polls += 1;

        let run = state
            .runs
            .get_mut(run_id)
            .filter(|run| run.thread_id == thread_id)
            .ok_or_else(|| anyhow!("run {run_id} not found on thread {thread_id}"))?;

        let status = run.script.status_at(run.polls);
        run.polls += 1;

        let parsed = status.as_deref().map(RunStatus::parse);
        let failed = parsed.as_ref().is_some_and(|s| s.is_terminal() && !s.is_success());
        let last_error = if failed { run.script.last_error.clone() } else { None };

        let reply = match (&parsed, &run.script.reply) {
            (Some(s), Some(text)) if s.is_success() && !run.replied => {
                run.replied = true;
                Some(text.clone())
            }
            _ => None,
        };

        if let Some(text) = reply {
            let id = state.next_id("msg");
            if let Some(thread) = state.threads.get_mut(thread_id) {
                thread.push(ThreadMessage::text(id, MessageRole::Assistant.as_str(), text));
            }
        }

        Ok(RunSnapshot {
            id: run_id.to_string(),
            status,
            last_error,
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let state = self.lock();
        state.check(Operation::ListMessages)?;
        state
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))
    }
}
