//! Creating the ticket-triage agent fleet.
//!
//! The three specialists are created first; the triage agent is then
//! created with one connected-agent tool per specialist so it can delegate
//! to them.

use anyhow::{Context, Result};

use crate::harness::{AgentRole, AgentRoster};
use crate::remote::{AgentProvisioner, AgentSpec, ToolDefinition};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Pick the model to provision with: `configured` unless blank.
pub fn resolve_model(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODEL)
        .to_string()
}

fn instructions(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Priority => "Return High/Medium/Low",
        AgentRole::Team => "Assign Frontend/Backend/Infra/Marketing",
        AgentRole::Effort => "Estimate Small/Medium/Large",
        AgentRole::Triage => "Coordinate priority, team, and effort via connected agents.",
    }
}

/// How the triage agent sees a specialist.
fn tool_description(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Priority => "Assesses ticket priority",
        AgentRole::Team => "Suggests responsible team",
        AgentRole::Effort => "Estimates effort required",
        AgentRole::Triage => "Coordinates ticket triage",
    }
}

/// Ids of a freshly created fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedFleet {
    pub model: String,
    pub agents: Vec<(AgentRole, String)>,
}

impl ProvisionedFleet {
    pub fn id_of(&self, role: AgentRole) -> Option<&str> {
        self.agents
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, id)| id.as_str())
    }

    /// The fleet as a roster, in canonical order.
    pub fn roster(&self) -> AgentRoster {
        AgentRole::ALL
            .into_iter()
            .filter_map(|role| self.id_of(role).map(|id| (role.name(), id)))
            .collect()
    }

    /// `KEY=id` lines suitable for an env file.
    pub fn env_lines(&self) -> Vec<String> {
        AgentRole::ALL
            .into_iter()
            .filter_map(|role| self.id_of(role).map(|id| format!("{}={id}", role.env_var())))
            .collect()
    }
}

/// Create the specialists and the triage agent that connects them.
pub async fn provision_fleet(provisioner: &dyn AgentProvisioner, model: &str) -> Result<ProvisionedFleet> {
    tracing::info!(model, "provisioning agents");

    let mut agents = Vec::with_capacity(AgentRole::ALL.len());
    let mut tools = Vec::with_capacity(AgentRole::SPECIALISTS.len());

    for role in AgentRole::SPECIALISTS {
        let spec = AgentSpec {
            model: model.to_string(),
            name: role.name().to_string(),
            instructions: instructions(role).to_string(),
            tools: vec![],
        };
        let handle = provisioner
            .create_agent(&spec)
            .await
            .with_context(|| format!("failed to create {role} agent"))?;
        tracing::info!(agent = role.name(), agent_id = %handle.id, "specialist agent created");

        let tool_name = handle.name.clone().unwrap_or_else(|| role.name().to_string());
        tools.push(ToolDefinition::connected_agent(
            handle.id.clone(),
            tool_name,
            tool_description(role),
        ));
        agents.push((role, handle.id));
    }

    let triage = AgentSpec {
        model: model.to_string(),
        name: AgentRole::Triage.name().to_string(),
        instructions: instructions(AgentRole::Triage).to_string(),
        tools,
    };
    let handle = provisioner
        .create_agent(&triage)
        .await
        .context("failed to create triage agent")?;
    tracing::info!(agent_id = %handle.id, "triage agent created");
    agents.push((AgentRole::Triage, handle.id));

    Ok(ProvisionedFleet {
        model: model.to_string(),
        agents,
    })
}
