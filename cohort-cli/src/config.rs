//! CLI configuration loading

use std::path::Path;

use anyhow::{Context, Result};
use cohort_core::CoreConfig;
use serde::Deserialize;

/// Configuration as stored in a TOML file; every section is optional and
/// falls back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohortConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub core: CoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl CohortConfig {
    /// Load configuration from a file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = CohortConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.core.score_bucket_size, 5);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[core]\nsubmission_grace_secs = 5\n"
        )
        .unwrap();

        let config = CohortConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.core.submission_grace_secs, 5);
        assert_eq!(config.core.score_bucket_size, 5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml [").unwrap();
        assert!(CohortConfig::load(Some(file.path())).is_err());
    }
}
