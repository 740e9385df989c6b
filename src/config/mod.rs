// src/config/mod.rs - Application configuration for the checker binary

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from YAML with env-var overrides in
/// the `RESGUARD_` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding blacklist.yaml and keywords.yaml.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
    /// Reload rule files automatically when they change on disk.
    #[serde(default = "default_true")]
    pub watch_rules: bool,
    /// Upper bound on one rule-store load; past it the previous snapshot
    /// stays in service.
    #[serde(default = "default_load_timeout_secs")]
    pub rule_load_timeout_secs: u64,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Stats collaborator base URL; unset means log-only reporting.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_report_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_report_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            watch_rules: true,
            rule_load_timeout_secs: default_load_timeout_secs(),
            reporting: ReportingConfig::default(),
        }
    }
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_true() -> bool {
    true
}

fn default_load_timeout_secs() -> u64 {
    5
}

fn default_report_timeout_secs() -> u64 {
    3
}

impl AppConfig {
    /// Load from a YAML file when it exists, defaults otherwise, then
    /// apply env overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else {
            debug!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides beat the file; empty values unset optionals.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("RESGUARD_RULES_DIR") {
            self.rules_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("RESGUARD_REPORT_ENDPOINT") {
            self.reporting.endpoint = if endpoint.is_empty() {
                None
            } else {
                Some(endpoint)
            };
        }
        if let Ok(value) = std::env::var("RESGUARD_WATCH_RULES") {
            self.watch_rules = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rules_dir, PathBuf::from("rules"));
        assert!(config.watch_rules);
        assert_eq!(config.rule_load_timeout_secs, 5);
        assert_eq!(config.reporting.endpoint, None);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/resguard.yaml")).unwrap();
        assert_eq!(config.rules_dir, AppConfig::default().rules_dir);
    }

    #[test]
    fn test_partial_yaml_fills_in_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "rules_dir: /srv/resguard/rules\nreporting:\n  endpoint: https://stats.example.com"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.rules_dir, PathBuf::from("/srv/resguard/rules"));
        assert_eq!(
            config.reporting.endpoint.as_deref(),
            Some("https://stats.example.com")
        );
        // Unspecified fields keep their defaults.
        assert!(config.watch_rules);
        assert_eq!(config.reporting.timeout_secs, 3);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rules_dir: [not, a, path").unwrap();
        assert!(AppConfig::load(file.path()).is_err());
    }
}
