//! `triage transcript` command: print a thread's messages.

use anyhow::Result;

use triage_core::remote::RemoteJobService;
use triage_core::transcript;

/// Run the transcript command.
pub async fn run_transcript(service: &dyn RemoteJobService, thread_id: &str, agent_only: bool) -> Result<()> {
    let lines = transcript::fetch_transcript(service, thread_id).await?;
    let lines = if agent_only {
        transcript::agent_lines(&lines)
    } else {
        lines
    };

    if lines.is_empty() {
        println!("Thread {thread_id} has no messages.");
        return Ok(());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
