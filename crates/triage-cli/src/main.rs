mod bootstrap_cmd;
mod config;
mod env_file;
mod serve_cmd;
mod test_all_cmd;
mod transcript_cmd;
mod verify_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser, Subcommand};

use triage_core::dns::SystemResolver;
use triage_core::harness::AgentRole;
use triage_core::remote::{FoundryClient, RemoteJobService};

use config::TriageConfig;
use env_file::EnvLayer;

const DEFAULT_TICKET: &str = "VPN outage affecting finance team";

#[derive(Parser)]
#[command(name = "triage", version, about = "Ticket-triage agent fleet tooling")]
struct Cli {
    /// Env file loaded on top of .env and the active azd environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Project endpoint (overrides AIFOUNDRY_PROJECT_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a triage config file
    Init {
        /// API version to store (defaults to the built-in version)
        #[arg(long)]
        api_version: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run one ticket through one agent and report the outcome
    Verify {
        /// Ticket text to send
        #[arg(long, default_value = DEFAULT_TICKET)]
        ticket: String,
        /// Seconds between status polls
        #[arg(long, default_value_t = 2.0)]
        poll_interval: f64,
        /// Seconds to wait for each run attempt
        #[arg(long, default_value_t = 120.0)]
        timeout: f64,
        /// Maximum run attempts when rate limited
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,
        /// Initial wait in seconds after a rate-limited attempt
        #[arg(long, default_value_t = 7.0)]
        initial_backoff: f64,
        /// Upper bound in seconds for the wait between attempts
        #[arg(long, default_value_t = 30.0)]
        max_backoff: f64,
        /// Agent to run (defaults to TRIAGE_AGENT_ID)
        #[arg(long)]
        agent_id: Option<String>,
        /// Print the thread transcript after the run
        #[arg(long)]
        show_transcript: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one ticket through every agent and print a consolidated report
    TestAll {
        /// Ticket text to send
        #[arg(long, default_value = DEFAULT_TICKET)]
        ticket: String,
        /// Seconds between status polls
        #[arg(long, default_value_t = 2.0)]
        poll_interval: f64,
        /// Seconds to wait for each run attempt
        #[arg(long, default_value_t = 120.0)]
        timeout: f64,
        /// Maximum run attempts per agent when rate limited
        #[arg(long, default_value_t = 12)]
        max_attempts: u32,
        /// Initial wait in seconds after a rate-limited attempt
        #[arg(long, default_value_t = 12.0)]
        initial_backoff: f64,
        /// Upper bound in seconds for the wait between attempts
        #[arg(long, default_value_t = 60.0)]
        max_backoff: f64,
        /// Print the per-agent outputs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the transcript of a thread
    Transcript {
        /// Thread ID
        thread_id: String,
        /// Only print agent-authored lines
        #[arg(long)]
        agent_only: bool,
    },
    /// Create the priority, team, effort and triage agents
    Bootstrap {
        /// Model deployment name (defaults to AIFOUNDRY_AGENT_MODEL, then gpt-4o)
        #[arg(long)]
        model: Option<String>,
        /// Store the new agent ids in the config file
        #[arg(long)]
        save: bool,
    },
    /// Serve the HTTP front
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Print a shell completion script
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Execute the `triage init` command: write config file.
fn cmd_init(endpoint: Option<&str>, env: &EnvLayer, api_version: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let Some(endpoint) = endpoint.or_else(|| env.first_of(&config::ENDPOINT_VARS)) else {
        bail!("--endpoint is required (or set AIFOUNDRY_PROJECT_ENDPOINT)");
    };

    let cfg = config::ConfigFile {
        service: config::ServiceSection {
            endpoint: Some(endpoint.to_string()),
            api_version,
        },
        agents: config::AgentsSection::default(),
    };

    config::save_config(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  service.endpoint = {endpoint}");
    if let Some(version) = &cfg.service.api_version {
        println!("  service.api_version = {version}");
    }
    println!();
    println!("Next: run `triage bootstrap --save` to create the agents.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "triage", &mut std::io::stdout());
        return Ok(());
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let env = EnvLayer::from_process().load(&cwd, cli.env_file.as_deref())?;

    if let Commands::Init { api_version, force } = cli.command {
        return cmd_init(cli.endpoint.as_deref(), &env, api_version, force);
    }

    let config_path = config::config_path();
    let file_config = config::load_config_if_present(&config_path)?;
    let resolved = TriageConfig::resolve(cli.endpoint.as_deref(), &env, file_config.as_ref())?;

    let client = Arc::new(FoundryClient::new(resolved.service.clone())?);
    tracing::info!(
        host = resolved.service.host().unwrap_or("unknown"),
        api_version = %resolved.service.api_version,
        "agents service configured"
    );
    let service: Arc<dyn RemoteJobService> = client.clone();
    let endpoint = resolved.service.endpoint.clone();

    match cli.command {
        Commands::Verify {
            ticket,
            poll_interval,
            timeout,
            max_attempts,
            initial_backoff,
            max_backoff,
            agent_id,
            show_transcript,
            json,
        } => {
            let agent_id = match agent_id {
                Some(id) => id,
                None => resolved.require_agent_id(AgentRole::Triage)?.to_string(),
            };
            let options = verify_cmd::VerifyOptions {
                agent_id,
                ticket,
                settings: verify_cmd::poll_settings(
                    poll_interval,
                    timeout,
                    max_attempts,
                    initial_backoff,
                    max_backoff,
                )?,
                show_transcript,
                json,
            };
            verify_cmd::run_verify(service, &endpoint, &options).await?;
        }
        Commands::TestAll {
            ticket,
            poll_interval,
            timeout,
            max_attempts,
            initial_backoff,
            max_backoff,
            json,
        } => {
            let roster = resolved.roster(&AgentRole::ALL)?;
            let settings =
                verify_cmd::poll_settings(poll_interval, timeout, max_attempts, initial_backoff, max_backoff)?;
            test_all_cmd::run_test_all(service, &roster, &ticket, settings, json).await?;
        }
        Commands::Transcript {
            thread_id,
            agent_only,
        } => {
            transcript_cmd::run_transcript(service.as_ref(), &thread_id, agent_only).await?;
        }
        Commands::Bootstrap { model, save } => {
            let model = model.or_else(|| env.get(config::MODEL_VAR).map(str::to_string));
            let options = bootstrap_cmd::BootstrapOptions {
                model: model.as_deref(),
                endpoint: &endpoint,
                account_host: env.get(config::ACCOUNT_HOST_VAR),
                dns_wait: config::dns_wait(&env),
                save_to: save.then_some(config_path.as_path()),
            };
            bootstrap_cmd::run_bootstrap(client.as_ref(), &SystemResolver, &options).await?;
        }
        Commands::Serve { bind, port } => {
            let state = serve_cmd::AppState {
                service,
                endpoint,
                triage_agent_id: resolved.agent_id(AgentRole::Triage).map(str::to_string),
            };
            serve_cmd::run_serve(state, &bind, port).await?;
        }
        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
