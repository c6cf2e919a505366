// src/config.rs
//! Engine configuration
//!
//! Supports TOML files with the following sections:
//! - [ordering] - Edge classification and graph-build parallelism
//! - [payload] - cpio decoding strictness and limits
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub ordering: OrderConfig,

    #[serde(default)]
    pub payload: PayloadOptions,
}

/// How requirements turn into ordering edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderConfig {
    /// Treat the legacy PREREQ sense bit as a hard edge
    #[serde(default = "default_true")]
    pub legacy_prereq_is_hard: bool,

    /// Never create edges for `rpmlib(...)` requirements
    #[serde(default = "default_true")]
    pub skip_rpmlib: bool,

    /// Package count at which edge computation fans out over rayon
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            legacy_prereq_is_hard: true,
            skip_rpmlib: true,
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

/// cpio payload decoding behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadOptions {
    /// Compare mode, mtime and size across hardlink group members
    #[serde(default = "default_true")]
    pub verify_hardlinks: bool,

    /// Turn hardlink and size problems into errors instead of warnings
    #[serde(default)]
    pub strict: bool,

    /// Largest single entry accepted
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            verify_hardlinks: true,
            strict: false,
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_parallel_threshold() -> usize {
    256
}

fn default_max_file_size() -> u64 {
    4 << 30
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::ConfigError(msg) => Error::ConfigError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.ordering.parallel_threshold == 0 {
            return Err(Error::ConfigError(
                "ordering.parallel_threshold must be at least 1".to_string(),
            ));
        }
        if self.payload.max_file_size == 0 {
            return Err(Error::ConfigError(
                "payload.max_file_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.ordering.legacy_prereq_is_hard);
        assert!(config.ordering.skip_rpmlib);
        assert_eq!(config.ordering.parallel_threshold, 256);
        assert!(config.payload.verify_hardlinks);
        assert!(!config.payload.strict);
        assert_eq!(config.payload.max_file_size, 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [ordering]
            parallel_threshold = 8

            [payload]
            strict = true
            "#,
        )
        .unwrap();
        assert_eq!(config.ordering.parallel_threshold, 8);
        assert!(config.ordering.skip_rpmlib);
        assert!(config.payload.strict);
        assert!(config.payload.verify_hardlinks);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("[ordering]\nfast = true\n"),
            Err(Error::ConfigError(_))
        ));
        assert!(EngineConfig::from_toml_str("[extra]\n").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        assert!(EngineConfig::from_toml_str("[ordering]\nparallel_threshold = 0\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[payload]\nmax_file_size = 1024").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.payload.max_file_size, 1024);

        let missing = file.path().with_extension("missing");
        assert!(EngineConfig::load(&missing).is_err());
    }
}
