use crate::error::CandidateError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming a covariance parameterization table.
pub const COVARIANCE_TABLE_ENV: &str = "MINICAND_COVARIANCE_TABLE";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    /// TOML table with the covariance parameterization. The built-in table
    /// is used when unset.
    pub covariance_table: Option<PathBuf>,
    /// Schema applied when packing track properties through the builder.
    pub default_covariance_schema: u16,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            covariance_table: None,
            default_covariance_schema: 1,
        }
    }
}

impl CodecConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CandidateError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CandidateError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded codec config");
        Ok(config)
    }

    /// Defaults, with the table path taken from [`COVARIANCE_TABLE_ENV`] when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(COVARIANCE_TABLE_ENV) {
            config.covariance_table = Some(PathBuf::from(path));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = CodecConfig::from_toml_str("default_covariance_schema = 3\n").unwrap();
        assert_eq!(cfg.default_covariance_schema, 3);
        assert!(cfg.covariance_table.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "covariance_table = \"/data/cov_v1.toml\"").unwrap();
        let cfg = CodecConfig::load(file.path()).unwrap();
        assert_eq!(cfg.covariance_table, Some(PathBuf::from("/data/cov_v1.toml")));
        assert_eq!(cfg.default_covariance_schema, 1);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = CodecConfig::from_toml_str("default_covariance_schema = \"x\"").unwrap_err();
        assert!(matches!(err, CandidateError::Config(_)));
    }
}
