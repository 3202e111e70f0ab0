//! Multi-agent harness: runs one ticket through every agent of a roster.
//!
//! # Flow
//!
//! ```text
//! for (name, agent_id) in roster (in order):
//!     RunDriver::execute(agent_id, ticket) --> RunOutcome
//!         |
//!         v
//!     list_messages(outcome.thread_id) --> transcript lines
//!         |
//!         v
//!     agent_lines(transcript) --> outputs[name]
//! ```
//!
//! Agents run strictly one after another. The first error aborts the pass;
//! there is no partial-result recovery.

pub mod roster;

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::remote::RemoteJobService;
use crate::run::{PollSettings, RunDriver, RunError, RunRequest};
use crate::transcript;

pub use roster::{AgentRole, AgentRoster, UnknownAgentRole};

/// Errors that abort a harness pass.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{agent} agent: {source}")]
    Run {
        agent: String,
        #[source]
        source: RunError,
    },

    #[error("{agent} agent: {error:#}")]
    Transcript { agent: String, error: anyhow::Error },
}

/// Per-agent output lines, in the order the agents ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentOutputs {
    entries: Vec<(String, Vec<String>)>,
}

impl AgentOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent: impl Into<String>, lines: Vec<String>) {
        self.entries.push((agent.into(), lines));
    }

    pub fn get(&self, agent: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, lines)| lines.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, lines)| (name.as_str(), lines.as_slice()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Serialized as a JSON object whose key order is the run order.
impl Serialize for AgentOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, lines) in &self.entries {
            map.serialize_entry(name, lines)?;
        }
        map.end()
    }
}

/// Runs a ticket through several agents and collects their replies.
#[derive(Debug, Clone)]
pub struct MultiAgentHarness {
    driver: RunDriver,
}

impl MultiAgentHarness {
    pub fn new(service: Arc<dyn RemoteJobService>) -> Self {
        Self {
            driver: RunDriver::new(service),
        }
    }

    /// Run `ticket` through every agent in `roster`, in roster order.
    ///
    /// Each agent gets its own thread and the same `settings`. The returned
    /// lines are the agent-authored part of each thread's transcript (or
    /// the full transcript when no line is attributable to the agent).
    pub async fn run_all(
        &self,
        ticket: &str,
        roster: &AgentRoster,
        settings: PollSettings,
    ) -> Result<AgentOutputs, HarnessError> {
        let mut outputs = AgentOutputs::new();

        for (name, agent_id) in roster.iter() {
            tracing::info!(agent = name, agent_id, "running agent");

            let request = RunRequest::new(agent_id, ticket, settings);
            let outcome = self
                .driver
                .execute(&request)
                .await
                .map_err(|source| HarnessError::Run {
                    agent: name.to_string(),
                    source,
                })?;

            if !outcome.succeeded {
                tracing::warn!(
                    agent = name,
                    status = %outcome.status,
                    error = ?outcome.last_error,
                    "agent run did not succeed; collecting transcript anyway"
                );
            }

            let lines = transcript::fetch_transcript(self.driver.service().as_ref(), &outcome.thread_id)
                .await
                .map_err(|error| HarnessError::Transcript {
                    agent: name.to_string(),
                    error,
                })?;

            outputs.push(name, transcript::agent_lines(&lines));
        }

        Ok(outputs)
    }
}
