//! `triage test-all` command: run one ticket through every agent.

use std::sync::Arc;

use anyhow::Result;

use triage_core::harness::{AgentOutputs, AgentRoster, HarnessError, MultiAgentHarness};
use triage_core::remote::RemoteJobService;
use triage_core::run::PollSettings;

use crate::verify_cmd::exit_code;

/// Consolidated report: an `[AGENT]` header per agent followed by its lines.
pub fn render_report(outputs: &AgentOutputs) -> String {
    let mut report = String::new();
    for (index, (agent, lines)) in outputs.iter().enumerate() {
        if index > 0 {
            report.push('\n');
        }
        report.push_str(&format!("[{}]\n", agent.to_uppercase()));
        for line in lines {
            report.push_str(line);
            report.push('\n');
        }
    }
    report
}

/// Run the test-all command.
pub async fn run_test_all(
    service: Arc<dyn RemoteJobService>,
    roster: &AgentRoster,
    ticket: &str,
    settings: PollSettings,
    json: bool,
) -> Result<()> {
    tracing::info!(
        agents = roster.len(),
        names = %roster.names().join(", "),
        "running ticket through agents"
    );

    let harness = MultiAgentHarness::new(service);
    let outputs = match harness.run_all(ticket, roster, settings).await {
        Ok(outputs) => outputs,
        Err(HarnessError::Run { agent, source }) => {
            eprintln!("{agent} agent: {source}");
            std::process::exit(exit_code(&source));
        }
        Err(err) => return Err(err.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        println!();
        print!("{}", render_report(&outputs));
    }
    Ok(())
}
