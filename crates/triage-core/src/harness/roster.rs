//! Agent roster -- the ordered set of agents a harness pass runs.
//!
//! Unlike a map keyed by name, the roster keeps insertion order: the
//! harness runs agents, and reports their output, in exactly this order.

use std::fmt;
use std::str::FromStr;

/// The agents of the ticket-triage fleet, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Priority,
    Team,
    Effort,
    Triage,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [Self::Priority, Self::Team, Self::Effort, Self::Triage];

    /// The three agents the triage agent delegates to.
    pub const SPECIALISTS: [AgentRole; 3] = [Self::Priority, Self::Team, Self::Effort];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Team => "team",
            Self::Effort => "effort",
            Self::Triage => "triage",
        }
    }

    /// Environment variable holding this agent's id.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Priority => "PRIORITY_AGENT_ID",
            Self::Team => "TEAM_AGENT_ID",
            Self::Effort => "EFFORT_AGENT_ID",
            Self::Triage => "TRIAGE_AGENT_ID",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentRole {
    type Err = UnknownAgentRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or_else(|| UnknownAgentRole(s.to_owned()))
    }
}

/// Error returned when parsing an unknown [`AgentRole`] name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown agent role: {0:?} (expected priority, team, effort, or triage)")]
pub struct UnknownAgentRole(pub String);

/// Ordered `(name, agent_id)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRoster {
    agents: Vec<(String, String)>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent at the end of the roster.
    ///
    /// If `name` is already present its id is replaced in place (keeping its
    /// position) and the old id is returned.
    pub fn insert(&mut self, name: impl Into<String>, agent_id: impl Into<String>) -> Option<String> {
        let name = name.into();
        let agent_id = agent_id.into();
        match self.agents.iter_mut().find(|(n, _)| *n == name) {
            Some((_, id)) => Some(std::mem::replace(id, agent_id)),
            None => {
                self.agents.push((name, agent_id));
                None
            }
        }
    }

    /// Look up an agent id by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.as_str())
    }

    /// `(name, agent_id)` pairs in roster order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.agents.iter().map(|(n, id)| (n.as_str(), id.as_str()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl<N: Into<String>, I: Into<String>> FromIterator<(N, I)> for AgentRoster {
    fn from_iter<T: IntoIterator<Item = (N, I)>>(iter: T) -> Self {
        let mut roster = Self::new();
        for (name, id) in iter {
            roster.insert(name, id);
        }
        roster
    }
}
