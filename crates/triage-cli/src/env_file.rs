//! Layered `.env` loading.
//!
//! Values come from, in ascending precedence:
//!
//! 1. `.env` in the working directory
//! 2. `.azure/<env-name>/.env`, the active azd environment
//! 3. the file passed with `--env-file`
//!
//! Note the direction: the most specific file wins. Scripts that source
//! the explicit file, then the azd file, then `.env`, each overwriting the
//! last, end up with `.env` winning instead. A key set differently in
//! `.env` and `--env-file` therefore resolves to the `--env-file` value
//! here.
//!
//! File values shadow the process environment for lookups made through
//! [`EnvLayer`]. The process environment itself is never modified.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading env files.
#[derive(Debug, thiserror::Error)]
pub enum EnvFileError {
    #[error("env file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read env file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// -----------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------

/// Parse `KEY=VALUE` lines.
///
/// Blank lines, `#` comments and lines without `=` are skipped. The key and
/// value are trimmed and one pair of matching surrounding quotes is removed
/// from the value.
pub fn parse_env(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// -----------------------------------------------------------------------
// azd environment
// -----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureConfig {
    #[serde(default)]
    defaults: AzureDefaults,
    default_environment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AzureDefaults {
    environment: Option<String>,
}

/// Name of the default azd environment recorded in `.azure/config.json`.
fn default_azure_env(root: &Path) -> Option<String> {
    let path = root.join(".azure").join("config.json");
    let contents = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<AzureConfig>(&contents) {
        Ok(config) => config
            .defaults
            .environment
            .or(config.default_environment)
            .filter(|name| !name.trim().is_empty()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed azd config");
            None
        }
    }
}

// -----------------------------------------------------------------------
// Layer
// -----------------------------------------------------------------------

/// Env-file values stacked over a snapshot of the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvLayer {
    files: HashMap<String, String>,
    process: HashMap<String, String>,
}

impl EnvLayer {
    /// A layer with no file values over the given process variables.
    pub fn new(process: HashMap<String, String>) -> Self {
        Self {
            files: HashMap::new(),
            process,
        }
    }

    pub fn from_process() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Load the env files found under `root`, then `explicit` if given.
    ///
    /// Missing or unreadable implicit files are skipped; an explicit file
    /// must exist and be readable.
    pub fn load(mut self, root: &Path, explicit: Option<&Path>) -> Result<Self, EnvFileError> {
        self.load_optional(&root.join(".env"));

        let env_name = self
            .get("AZURE_ENV_NAME")
            .map(str::to_string)
            .or_else(|| default_azure_env(root));
        if let Some(name) = env_name {
            self.load_optional(&root.join(".azure").join(name).join(".env"));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(EnvFileError::Missing(path.to_path_buf()));
            }
            let contents = std::fs::read_to_string(path).map_err(|source| EnvFileError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            self.apply(path, parse_env(&contents));
        }

        Ok(self)
    }

    fn load_optional(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => self.apply(path, parse_env(&contents)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable env file"),
        }
    }

    /// Stack `vars` from `source` over the current values.
    pub fn apply(&mut self, source: &Path, vars: Vec<(String, String)>) {
        let count = vars.len();
        for (key, value) in vars {
            if self.process.get(&key).is_some_and(|existing| *existing != value) {
                tracing::info!(key, source = %source.display(), "env file overrides process value");
            }
            self.files.insert(key, value);
        }
        tracing::debug!(source = %source.display(), count, "loaded env file");
    }

    /// Look up `key`, file values first. Blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.files
            .get(key)
            .or_else(|| self.process.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The first of `keys` that is set.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }
}
