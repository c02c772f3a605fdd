use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::source::UsageRecord;

/// Top-level configuration loaded from `.kubesunset.yaml` or an explicit path.
///
/// Every value can be overridden from the command line
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
  /// Kubernetes version whose OpenAPI document is the target of the check
  #[serde(default)]
  pub k8s_version: Option<String>,

  /// Kubernetes version whose served APIs are the baseline for removal detection
  #[serde(default)]
  pub previous_version: Option<String>,

  /// Report served deprecated/deleted kinds even when no object uses them
  #[serde(default)]
  pub api_walk: bool,

  /// Directory where downloaded OpenAPI documents are cached
  #[serde(default)]
  pub swagger_dir: Option<PathBuf>,

  /// Include API descriptions in text output
  #[serde(default)]
  pub show_description: bool,

  /// Usages to leave out of the report entirely
  #[serde(default)]
  pub ignore: Vec<ResourceSelector>,
}

/// Identifies usages by kind, name and/or namespace; unset fields match anything
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSelector {
  #[serde(default)]
  pub kind: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub namespace: Option<String>,
}

impl ResourceSelector {
  pub fn matches(&self, record: &UsageRecord) -> bool {
    let kind = self.kind.as_ref().is_none_or(|k| *k == record.gvk.kind);
    let name = self
      .name
      .as_ref()
      .is_none_or(|n| record.object_name.as_ref() == Some(n));
    let namespace = self.namespace.as_ref().is_none_or(|ns| *ns == record.namespace);

    kind && name && namespace
  }
}

const DEFAULT_CONFIG_FILE: &str = ".kubesunset.yaml";

/// Load configuration from an explicit path, the default `.kubesunset.yaml` in the
/// current working directory, or fall back to `Config::default()`.
pub fn load(path: Option<&Path>) -> Result<Config> {
  load_from(path, std::env::current_dir().ok().as_deref())
}

fn load_from(path: Option<&Path>, base_dir: Option<&Path>) -> Result<Config> {
  if let Some(p) = path {
    return read(p);
  }

  // Try default path in base directory
  if let Some(dir) = base_dir {
    let default_path = dir.join(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
      return read(&default_path);
    }
  }

  Ok(Config::default())
}

fn read(path: &Path) -> Result<Config> {
  let contents =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
  let config: Config =
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))?;
  tracing::debug!("Loaded configuration from {}", path.display());

  Ok(config)
}
