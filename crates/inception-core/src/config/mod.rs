//! Configuration for the `inception` driver.
//!
//! Every section is optional; an absent `inception.toml` yields
//! [`InceptionConfig::default`]. Command-line flags override these values.
//!
//! ```toml
//! [paths]
//! simulation_dir = "bundles/sim"
//! llm_dir = "bundles/llm"
//! output_dir = "bundles/blended"
//!
//! [attestor]
//! key_file = "keys/attestor.json"
//! trusted = ["keys/attestor.pub.json"]
//!
//! [blend]
//! require_audit = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{AttestorError, AttestorIdentity};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "inception.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InceptionConfig {
    /// Bundle directories.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Signing key and trusted identities.
    #[serde(default)]
    pub attestor: AttestorConfig,

    /// Blend behaviour.
    #[serde(default)]
    pub blend: BlendConfig,
}

impl InceptionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails [`Self::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a directory is empty, the two
    /// input directories coincide, or a trusted entry is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("paths.simulation_dir", &self.paths.simulation_dir),
            ("paths.llm_dir", &self.paths.llm_dir),
            ("paths.output_dir", &self.paths.output_dir),
        ];
        for (key, dir) in dirs {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.paths.simulation_dir == self.paths.llm_dir {
            return Err(ConfigError::Validation(
                "paths.simulation_dir and paths.llm_dir must differ".to_string(),
            ));
        }
        if self.attestor.trusted.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::Validation(
                "attestor.trusted entries must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bundle directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Where the simulation path writes signed bundles.
    #[serde(default = "default_simulation_dir")]
    pub simulation_dir: PathBuf,

    /// Where the LLM path writes signed bundles.
    #[serde(default = "default_llm_dir")]
    pub llm_dir: PathBuf,

    /// Where blended bundles are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            simulation_dir: default_simulation_dir(),
            llm_dir: default_llm_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_simulation_dir() -> PathBuf {
    PathBuf::from("bundles/sim")
}

fn default_llm_dir() -> PathBuf {
    PathBuf::from("bundles/llm")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("bundles/blended")
}

/// Signing key and trusted identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttestorConfig {
    /// Secret key file used by `simulate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Public identity files accepted by `audit` and `blend`.
    #[serde(default)]
    pub trusted: Vec<PathBuf>,
}

impl AttestorConfig {
    /// Loads every trusted identity file.
    ///
    /// # Errors
    ///
    /// Returns the first [`AttestorError`] from [`AttestorIdentity::load`].
    pub fn load_trusted(&self) -> Result<Vec<AttestorIdentity>, AttestorError> {
        self.trusted
            .iter()
            .map(|path| AttestorIdentity::load(path))
            .collect()
    }
}

/// Blend behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlendConfig {
    /// Audit both inputs before blending and refuse to blend on failure.
    #[serde(default = "default_require_audit")]
    pub require_audit: bool,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            require_audit: default_require_audit(),
        }
    }
}

const fn default_require_audit() -> bool {
    true
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::crypto::Attestor;

    #[test]
    fn test_empty_config_is_default() {
        let config = InceptionConfig::from_toml("").unwrap();
        assert_eq!(config, InceptionConfig::default());
        assert_eq!(config.paths.simulation_dir, PathBuf::from("bundles/sim"));
        assert_eq!(config.paths.llm_dir, PathBuf::from("bundles/llm"));
        assert_eq!(config.paths.output_dir, PathBuf::from("bundles/blended"));
        assert!(config.blend.require_audit);
        assert!(config.attestor.trusted.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [paths]
            simulation_dir = "/data/sim"
            llm_dir = "/data/llm"
            output_dir = "/data/out"

            [attestor]
            key_file = "keys/sim.json"
            trusted = ["keys/sim.pub.json", "keys/llm.pub.json"]

            [blend]
            require_audit = false
        "#;

        let config = InceptionConfig::from_toml(toml).unwrap();
        assert_eq!(config.paths.llm_dir, PathBuf::from("/data/llm"));
        assert_eq!(config.attestor.key_file, Some(PathBuf::from("keys/sim.json")));
        assert_eq!(config.attestor.trusted.len(), 2);
        assert!(!config.blend.require_audit);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = InceptionConfig::from_toml("[paths]\nllm_dir = \"x\"\n").unwrap();
        assert_eq!(config.paths.llm_dir, PathBuf::from("x"));
        assert_eq!(config.paths.simulation_dir, PathBuf::from("bundles/sim"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = InceptionConfig::from_toml("[blend]\nrequire_adit = true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_same_input_dirs_rejected() {
        let toml = "[paths]\nsimulation_dir = \"d\"\nllm_dir = \"d\"\n";
        assert!(matches!(
            InceptionConfig::from_toml(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = InceptionConfig::default();
        config.attestor.trusted.push(PathBuf::from("keys/a.pub.json"));
        config.blend.require_audit = false;

        let text = config.to_toml().unwrap();
        assert_eq!(InceptionConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = InceptionConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, InceptionConfig::default());

        assert!(matches!(
            InceptionConfig::from_file(&tmp.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_trusted_identities() {
        let tmp = TempDir::new().unwrap();
        let attestor = Attestor::from_seed("sim-attestor", [9; 32]);
        let public = attestor.save(&tmp.path().join("sim.json")).unwrap();

        let config = AttestorConfig {
            key_file: None,
            trusted: vec![public],
        };
        let trusted = config.load_trusted().unwrap();
        assert_eq!(trusted.len(), 1);
        assert_eq!(trusted[0].id(), "sim-attestor");
    }
}
