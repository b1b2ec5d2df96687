//! Configuration Management
//!
//! Emulator settings, optionally loaded from a YAML file. Nothing here is required:
//! every field has a default, and the mock entry points work without any file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "MOCKCLOUD_CONFIG";

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// An instance created through the provider's adapter whenever a fresh virtual
/// cloud is built from this configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SeedInstance {
    Google {
        project: String,
        zone: String,
        body: Value,
    },
    Azure {
        subscription: String,
        resource_group: String,
        name: String,
        body: Value,
    },
    Oracle {
        body: Value,
    },
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Seed for generated identifiers; random when unset
    pub id_seed: Option<u64>,
    /// Network private addresses are allocated from
    pub network_cidr: String,
    /// Whether new instances start `Running` rather than staying `Created`
    pub start_instances: bool,
    /// Virtual machines per page in Azure list responses
    pub azure_page_size: usize,
    /// Region segment of generated Oracle OCIDs
    pub oracle_region: String,
    /// Instances created in every fresh virtual cloud
    pub seed: Vec<SeedInstance>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            id_seed: None,
            network_cidr: "10.0.0.0/24".to_string(),
            start_instances: true,
            azure_page_size: 50,
            oracle_region: String::new(),
            seed: Vec::new(),
        }
    }
}

impl EmulatorConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mockcloud").join("config.yaml"))
    }

    /// Resolve configuration (explicit path > `MOCKCLOUD_CONFIG` > default file > defaults)
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.azure_page_size == 0 {
            return Err(ConfigError::Invalid(
                "azure_page_size must be at least 1".to_string(),
            ));
        }
        crate::store::ids::AddressPool::parse(&self.network_cidr)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Same configuration with a fixed id seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EmulatorConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EmulatorConfig::default());
        assert!(config.start_instances);
        assert_eq!(config.network_cidr, "10.0.0.0/24");
    }

    #[test]
    fn test_partial_document() {
        let config = EmulatorConfig::from_yaml_str(
            "id_seed: 42\nazure_page_size: 2\nstart_instances: false\n",
        )
        .unwrap();
        assert_eq!(config.id_seed, Some(42));
        assert_eq!(config.azure_page_size, 2);
        assert!(!config.start_instances);
        assert_eq!(config.oracle_region, "");
    }

    #[test]
    fn test_seed_entries() {
        let yaml = r#"
seed:
  - provider: google
    project: foo
    zone: bar
    body:
      name: vm1
  - provider: azure
    subscription: sub
    resource_group: group
    name: vm2
    body:
      location: eastus
  - provider: oracle
    body:
      compartmentId: c1
      displayName: vm3
"#;
        let config = EmulatorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.seed.len(), 3);
        assert_eq!(
            config.seed[0],
            SeedInstance::Google {
                project: "foo".into(),
                zone: "bar".into(),
                body: json!({"name": "vm1"}),
            }
        );
        assert!(matches!(config.seed[1], SeedInstance::Azure { ref name, .. } if name == "vm2"));
        assert!(matches!(config.seed[2], SeedInstance::Oracle { .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EmulatorConfig::from_yaml_str("azure_page_size: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EmulatorConfig::from_yaml_str("network_cidr: nonsense"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EmulatorConfig::from_yaml_str("seed: 12"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = EmulatorConfig::load(Some(Path::new("/nonexistent/mockcloud.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
