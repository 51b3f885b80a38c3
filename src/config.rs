use std::path::PathBuf;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::AdminError;
use crate::navigation::ViewId;

pub const DEFAULT_CONFIG_PATH: &str = "~/.recadmin/config.yml";
pub const DEFAULT_LOG_FILE: &str = "~/.recadmin/recadmin.log";

/// Contents of the YAML config file; every key is optional.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    pub page_length: Option<usize>,
    pub default_view: Option<String>,
    pub log_file: Option<String>,
    pub event_poll_time: Option<u64>,
}

/// Effective settings after merging defaults, the config file and the CLI.
#[derive(Debug, Clone, PartialEq, Setters)]
pub struct AdminConfig {
    #[setters(into)]
    pub base_url: String,
    pub timeout: u64,
    pub page_length: usize,
    pub default_view: ViewId,
    pub log_file: PathBuf,
    pub event_poll_time: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6543".to_string(),
            timeout: 30,
            page_length: 10,
            default_view: ViewId::Scans,
            log_file: expand_path(DEFAULT_LOG_FILE),
            event_poll_time: 100,
        }
    }
}

impl AdminConfig {
    pub fn merge(mut self, file: &ConfigFile) -> Self {
        if let Some(url) = &file.base_url {
            self.base_url = url.clone();
        }
        if let Some(timeout) = file.timeout {
            self.timeout = timeout;
        }
        if let Some(length) = file.page_length {
            self.page_length = length.max(1);
        }
        if let Some(label) = &file.default_view {
            match label.parse::<ViewId>() {
                Ok(view) => self.default_view = view,
                Err(e) => warn!("{e}, starting with {}", self.default_view),
            }
        }
        if let Some(path) = &file.log_file {
            self.log_file = expand_path(path);
        }
        if let Some(poll) = file.event_poll_time {
            self.event_poll_time = poll;
        }
        self
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Reads the YAML file. A missing file is only accepted when `allow_missing`.
pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, AdminError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents).map_err(|e| {
            AdminError::ConfigError(format!("failed to parse config '{}': {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdminError::ConfigError(
            format!("config file not found '{}'", path.display()),
        )),
        Err(e) => Err(AdminError::ConfigError(format!(
            "failed to read config '{}': {e}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let file: ConfigFile = serde_yaml::from_str(
            "base_url: http://archive.example.org\npage_length: 25\ndefault_view: EAD\n",
        )
        .unwrap();
        let cfg = AdminConfig::default().merge(&file);
        assert_eq!(cfg.base_url, "http://archive.example.org");
        assert_eq!(cfg.page_length, 25);
        assert_eq!(cfg.default_view, ViewId::Ead);
        assert_eq!(cfg.timeout, 30);
    }

    #[test]
    fn unknown_default_view_keeps_scans() {
        let file = ConfigFile {
            default_view: Some("Reports".into()),
            ..Default::default()
        };
        assert_eq!(AdminConfig::default().merge(&file).default_view, ViewId::Scans);
    }

    #[test]
    fn missing_file() {
        let path = PathBuf::from("/nonexistent/recadmin/config.yml");
        assert_eq!(load_config(&path, true).unwrap(), ConfigFile::default());
        assert!(load_config(&path, false).is_err());
    }

    #[test]
    fn setters_build_config() {
        let cfg = AdminConfig::default().base_url("http://x").page_length(50);
        assert_eq!(cfg.base_url, "http://x");
        assert_eq!(cfg.page_length, 50);
    }

    #[test]
    fn tilde_is_expanded() {
        assert!(!expand_path("~/x.log").to_string_lossy().starts_with('~'));
    }
}
