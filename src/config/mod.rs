//! # Deployment Configuration
//!
//! Each revision carries its own hook config file (default
//! `compose-hook.yml`) at the repository root, keyed by branch name:
//!
//! ```yaml
//! main:
//!   project: shop
//!   tail_log: 30s
//! staging:
//!   project: shop-staging
//!   file: docker-compose.staging.yml
//!   skip_pull: true
//! ```
//!
//! The file is read from the materialized workspace of the pushed commit,
//! so a push deploys with the configuration committed alongside it.

mod deployment;

pub use deployment::DeploymentConfig;

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::ConfigError;

/// Default hook config filename
pub const DEFAULT_CONFIG_FILE: &str = "compose-hook.yml";

/// Branch configurations in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSet {
    entries: Vec<(String, DeploymentConfig)>,
}

impl ConfigSet {
    /// Build a set, rejecting it entirely if any entry is invalid
    pub fn new(entries: Vec<(String, DeploymentConfig)>) -> Result<Self, ConfigError> {
        for (branch, config) in &entries {
            config
                .validate()
                .map_err(|_| ConfigError::MissingProject {
                    branch: branch.clone(),
                })?;
        }
        Ok(Self { entries })
    }

    /// Parse a YAML document. An empty document is an empty set.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let doc: Value = serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
        let mapping = match doc {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(parse_err("expected a mapping of branch names".to_string())),
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let branch = match key {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => return Err(parse_err(format!("invalid branch name: {:?}", other))),
            };
            let config: DeploymentConfig = serde_yaml::from_value(value)
                .map_err(|e| parse_err(format!("{}: {}", branch, e)))?;
            entries.push((branch, config));
        }

        Self::new(entries)
    }

    /// Configs whose key equals `branch`, in document order
    pub fn for_branch<'a>(
        &'a self,
        branch: &'a str,
    ) -> impl Iterator<Item = &'a DeploymentConfig> + 'a {
        self.entries
            .iter()
            .filter(move |(name, _)| name == branch)
            .map(|(_, config)| config)
    }

    #[cfg(test)]
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Path of the hook config inside a workspace
pub fn config_path(workspace: &Path, config_file: &str) -> PathBuf {
    workspace.join(config_file)
}

/// Load the hook config of a workspace.
///
/// Returns `Ok(None)` when the revision has no config file; that revision
/// simply carries no deployment instructions. Anything else at that path
/// that cannot be read is an error. The full set is returned, filtering by
/// branch is up to the caller.
pub fn resolve(workspace: &Path, config_file: &str) -> Result<Option<ConfigSet>, ConfigError> {
    let path = config_path(workspace, config_file);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    ConfigSet::from_yaml(&content, &path).map(Some)
}
