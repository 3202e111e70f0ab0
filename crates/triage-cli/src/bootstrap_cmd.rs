//! `triage bootstrap` command: create the agent fleet.

use std::path::Path;

use anyhow::Result;

use triage_core::dns::{self, DnsWait, HostResolver};
use triage_core::provision::{self, ProvisionedFleet};
use triage_core::remote::AgentProvisioner;

use crate::config::{self, ConfigFile};

/// Record `fleet` in the config file at `path`, keeping everything else.
///
/// `endpoint` is stored when the file does not name one yet.
pub fn save_fleet(path: &Path, fleet: &ProvisionedFleet, endpoint: &str) -> Result<ConfigFile> {
    let mut cfg = config::load_config_if_present(path)?.unwrap_or_default();
    if cfg.service.endpoint.is_none() {
        cfg.service.endpoint = Some(endpoint.to_string());
    }
    for (role, id) in &fleet.agents {
        cfg.agents.set(*role, id.clone());
    }
    config::save_config(path, &cfg)?;
    Ok(cfg)
}

/// Inputs of the bootstrap command.
#[derive(Debug, Clone)]
pub struct BootstrapOptions<'a> {
    pub model: Option<&'a str>,
    pub endpoint: &'a str,
    /// Host tried when the endpoint host never resolves.
    pub account_host: Option<&'a str>,
    pub dns_wait: DnsWait,
    pub save_to: Option<&'a Path>,
}

/// Run the bootstrap command.
///
/// Waits for the endpoint's host name to resolve before creating agents.
pub async fn run_bootstrap(
    provisioner: &dyn AgentProvisioner,
    resolver: &dyn HostResolver,
    options: &BootstrapOptions<'_>,
) -> Result<()> {
    let host = dns::wait_for_endpoint(resolver, options.endpoint, options.account_host, options.dns_wait).await?;
    tracing::info!(host = %host, "endpoint host resolved");

    let model = provision::resolve_model(options.model);
    println!("Creating agents with model {model}...");

    let fleet = provision::provision_fleet(provisioner, &model).await?;

    println!();
    for line in fleet.env_lines() {
        println!("{line}");
    }

    if let Some(path) = options.save_to {
        save_fleet(path, &fleet, options.endpoint)?;
        println!();
        println!("Agent ids saved to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use triage_core::harness::AgentRole;
    use triage_core::remote::{AgentHandle, AgentSpec};

    struct Unresolvable;

    #[async_trait]
    impl HostResolver for Unresolvable {
        async fn resolve(&self, host: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, format!("{host} not found")))
        }
    }

    #[derive(Default)]
    struct RecordingProvisioner {
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AgentProvisioner for RecordingProvisioner {
        async fn create_agent(&self, spec: &AgentSpec) -> anyhow::Result<AgentHandle> {
            let mut created = self.created.lock().unwrap();
            created.push(spec.name.clone());
            Ok(AgentHandle {
                id: format!("asst_{}", created.len()),
                name: Some(spec.name.clone()),
            })
        }
    }

    fn options(endpoint: &str) -> BootstrapOptions<'_> {
        BootstrapOptions {
            model: Some("gpt-4o-mini"),
            endpoint,
            account_host: None,
            dns_wait: DnsWait {
                timeout: Duration::from_millis(50),
                interval: Duration::from_millis(10),
            },
            save_to: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_stops_when_endpoint_never_resolves() {
        let provisioner = RecordingProvisioner::default();

        let err = run_bootstrap(&provisioner, &Unresolvable, &options("https://proj.example/api/projects/p"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("DNS name proj.example did not resolve"), "{err}");
        assert!(provisioner.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_saves_fleet_once_endpoint_resolves() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let provisioner = RecordingProvisioner::default();
        let mut options = options("http://127.0.0.1:9/api/projects/p");
        options.save_to = Some(&path);

        run_bootstrap(&provisioner, &dns::SystemResolver, &options).await.unwrap();

        assert_eq!(provisioner.created.lock().unwrap().len(), 4);
        let cfg = config::load_config(&path).unwrap();
        assert_eq!(cfg.service.endpoint.as_deref(), Some("http://127.0.0.1:9/api/projects/p"));
        assert!(cfg.agents.get(AgentRole::Triage).is_some());
    }

    fn fleet() -> ProvisionedFleet {
        ProvisionedFleet {
            model: "gpt-4o".to_string(),
            agents: vec![
                (AgentRole::Priority, "asst_p".to_string()),
                (AgentRole::Team, "asst_t".to_string()),
                (AgentRole::Effort, "asst_e".to_string()),
                (AgentRole::Triage, "asst_x".to_string()),
            ],
        }
    }

    #[test]
    fn save_fleet_creates_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("triage").join("config.toml");

        save_fleet(&path, &fleet(), "https://x.example/api/projects/p").unwrap();

        let cfg = config::load_config(&path).unwrap();
        assert_eq!(cfg.service.endpoint.as_deref(), Some("https://x.example/api/projects/p"));
        assert_eq!(cfg.agents.get(AgentRole::Triage), Some("asst_x"));
        assert_eq!(cfg.agents.get(AgentRole::Effort), Some("asst_e"));
    }

    #[test]
    fn save_fleet_keeps_existing_service_settings() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[service]\nendpoint = \"https://kept.example\"\napi_version = \"2024-12-01\"\n\n[agents]\ntriage = \"asst_old\"\n",
        )
        .unwrap();

        let cfg = save_fleet(&path, &fleet(), "https://other.example").unwrap();

        assert_eq!(cfg.service.endpoint.as_deref(), Some("https://kept.example"));
        assert_eq!(cfg.service.api_version.as_deref(), Some("2024-12-01"));
        assert_eq!(cfg.agents.get(AgentRole::Triage), Some("asst_x"));
    }
}
