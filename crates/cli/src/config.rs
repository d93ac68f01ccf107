//! Configuration management for the CLI
//!
//! Defaults come from `~/.config/k8stools/config.json`, overlaid by
//! `K8STOOLS_*` environment variables. Command-line flags win over both.

use anyhow::{Context, Result};
use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use inspect_lib::{InitContainerPolicy, SpotSelector};

/// Prefix of the environment overlay
const ENV_PREFIX: &str = "K8STOOLS";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Kubernetes context used when `--context` is not given
    pub context: Option<String>,
    /// Sort key for the podcount and resources views
    pub default_sort: Option<String>,
    /// Node label columns always shown by podcount
    pub node_labels: Vec<String>,
    /// Count init containers in requests and limits
    pub include_init_containers: bool,
    /// Node label marking spot capacity
    pub spot_label: Option<String>,
    pub spot_value: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("node_labels"),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?
            .try_deserialize()
            .context("Failed to parse config file")
    }

    pub fn init_policy(&self) -> InitContainerPolicy {
        if self.include_init_containers {
            InitContainerPolicy::Include
        } else {
            InitContainerPolicy::Exclude
        }
    }

    /// Spot selector with configured overrides applied
    pub fn spot_selector(&self) -> SpotSelector {
        let defaults = SpotSelector::default();
        SpotSelector {
            label: self.spot_label.clone().unwrap_or(defaults.label),
            value: self.spot_value.clone().unwrap_or(defaults.value),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("k8stools").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.init_policy(), InitContainerPolicy::Exclude);
        assert_eq!(config.spot_selector(), SpotSelector::default());
    }

    #[test]
    fn test_file_values_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{
                "context": "staging",
                "default_sort": "cpu-req",
                "node_labels": ["topology.kubernetes.io/zone"],
                "include_init_containers": true,
                "spot_label": "karpenter.sh/capacity-type",
                "spot_value": "spot"
            }}"#
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.context.as_deref(), Some("staging"));
        assert_eq!(config.default_sort.as_deref(), Some("cpu-req"));
        assert_eq!(config.node_labels, vec!["topology.kubernetes.io/zone"]);
        assert_eq!(config.init_policy(), InitContainerPolicy::Include);
        assert_eq!(config.spot_selector().label, "karpenter.sh/capacity-type");
        assert_eq!(config.spot_selector().value, "spot");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
