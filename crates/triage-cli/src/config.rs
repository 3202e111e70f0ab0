//! Configuration file management for triage.
//!
//! Provides a TOML-based config file at `~/.config/triage/config.toml` and a
//! resolution chain: CLI flag > env file > process env > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use triage_core::dns::DnsWait;
use triage_core::harness::{AgentRole, AgentRoster};
use triage_core::remote::ServiceConfig;

use crate::env_file::EnvLayer;

/// Variables checked for the project endpoint, in order.
pub const ENDPOINT_VARS: [&str; 3] = ["AIFOUNDRY_PROJECT_ENDPOINT", "projectEndpoint", "PROJECT_ENDPOINT"];
pub const TOKEN_VAR: &str = "AIFOUNDRY_ACCESS_TOKEN";
pub const API_VERSION_VAR: &str = "AIFOUNDRY_API_VERSION";
pub const MODEL_VAR: &str = "AIFOUNDRY_AGENT_MODEL";
pub const ACCOUNT_HOST_VAR: &str = "AIFOUNDRY_ACCOUNT_HOST";
pub const DNS_TIMEOUT_VAR: &str = "AIFOUNDRY_DNS_TIMEOUT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default, skip_serializing_if = "AgentsSection::is_empty")]
    pub agents: AgentsSection,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// Agent ids keyed by role.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage: Option<String>,
}

impl AgentsSection {
    fn slot(&mut self, role: AgentRole) -> &mut Option<String> {
        match role {
            AgentRole::Priority => &mut self.priority,
            AgentRole::Team => &mut self.team,
            AgentRole::Effort => &mut self.effort,
            AgentRole::Triage => &mut self.triage,
        }
    }

    pub fn get(&self, role: AgentRole) -> Option<&str> {
        let id = match role {
            AgentRole::Priority => &self.priority,
            AgentRole::Team => &self.team,
            AgentRole::Effort => &self.effort,
            AgentRole::Triage => &self.triage,
        };
        id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn set(&mut self, role: AgentRole, id: impl Into<String>) {
        *self.slot(role) = Some(id.into());
    }

    pub fn is_empty(&self) -> bool {
        AgentRole::ALL.iter().all(|role| self.get(*role).is_none())
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the triage config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/triage` or `~/.config/triage`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("triage");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("triage")
}

/// Return the path to the triage config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if one exists. A malformed file is an error.
pub fn load_config_if_present(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    load_config(path).map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub service: ServiceConfig,
    agents: Vec<(AgentRole, String)>,
}

impl TriageConfig {
    /// Resolve configuration using the chain: CLI flag > env > config file > default.
    ///
    /// - Endpoint: `cli_endpoint` > [`ENDPOINT_VARS`] > `service.endpoint` > error
    /// - API version: `AIFOUNDRY_API_VERSION` > `service.api_version` > default
    /// - Agent ids: `<ROLE>_AGENT_ID` > `[agents]`
    pub fn resolve(cli_endpoint: Option<&str>, env: &EnvLayer, file: Option<&ConfigFile>) -> Result<Self> {
        let endpoint = cli_endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .or_else(|| env.first_of(&ENDPOINT_VARS))
            .or_else(|| {
                file.and_then(|f| f.service.endpoint.as_deref())
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
            });
        let Some(endpoint) = endpoint else {
            bail!(
                "project endpoint not found; set AIFOUNDRY_PROJECT_ENDPOINT \
                 (try `azd env get-values`) or run `triage init --endpoint <url>`"
            );
        };

        let api_version = env
            .get(API_VERSION_VAR)
            .or_else(|| file.and_then(|f| f.service.api_version.as_deref()))
            .unwrap_or(ServiceConfig::DEFAULT_API_VERSION);

        let mut service = ServiceConfig::new(endpoint).with_api_version(api_version);
        if let Some(token) = env.get(TOKEN_VAR) {
            service = service.with_access_token(token);
        }

        let agents = AgentRole::ALL
            .into_iter()
            .filter_map(|role| {
                env.get(role.env_var())
                    .or_else(|| file.and_then(|f| f.agents.get(role)))
                    .map(|id| (role, id.to_string()))
            })
            .collect();

        Ok(Self { service, agents })
    }

    pub fn agent_id(&self, role: AgentRole) -> Option<&str> {
        self.agents
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, id)| id.as_str())
    }

    /// The id for `role`, or an error naming the variable to set.
    pub fn require_agent_id(&self, role: AgentRole) -> Result<&str> {
        match self.agent_id(role) {
            Some(id) => Ok(id),
            None => bail!(
                "{} is not set; run `triage bootstrap --save` or set it in your env file",
                role.env_var()
            ),
        }
    }

    /// A roster of `roles`, in the given order. Every role must be configured.
    pub fn roster(&self, roles: &[AgentRole]) -> Result<AgentRoster> {
        let mut roster = AgentRoster::new();
        for role in roles {
            roster.insert(role.name(), self.require_agent_id(*role)?);
        }
        Ok(roster)
    }
}

/// DNS wait used by bootstrap. `AIFOUNDRY_DNS_TIMEOUT` is whole seconds;
/// a value that does not parse keeps the default.
pub fn dns_wait(env: &EnvLayer) -> DnsWait {
    let mut wait = DnsWait::default();
    if let Some(raw) = env.get(DNS_TIMEOUT_VAR) {
        match raw.parse::<u64>() {
            Ok(secs) => wait.timeout = Duration::from_secs(secs),
            Err(_) => tracing::warn!(
                value = raw,
                default_secs = wait.timeout.as_secs(),
                "ignoring invalid AIFOUNDRY_DNS_TIMEOUT"
            ),
        }
    }
    wait
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
