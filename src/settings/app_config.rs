//! User configuration, layered from defaults, `config.toml` and environment

use crate::utils::{get_config_dir, PROJECT_NAME};
use color_eyre::eyre;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Volt gateway, e.g. `http://localhost:8080`
    pub api_base_url: String,
    /// Quiet period after the last finished upload before results are handed to the dashboard
    pub quiescence_ms: u64,
    /// Delay after a flush check before progress bars are cleared
    pub clear_progress_ms: u64,
    /// Files above this size are rejected before any network I/O
    pub max_file_size: u64,
    /// Number of uploads running at the same time
    pub upload_concurrency: usize,
    pub private_uploads: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base_url: "http://localhost:8080".to_string(),
            quiescence_ms: 500,
            clear_progress_ms: 2000,
            max_file_size: 10 * 1024 * 1024,
            upload_concurrency: 3,
            private_uploads: true,
        }
    }
}

impl AppConfig {
    /// Load from the user's config directory and `VOLT_TUI_*` variables
    pub fn load() -> eyre::Result<Self> {
        Self::load_from(&get_config_dir().join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> eyre::Result<Self> {
        let defaults = AppConfig::default();
        let settings = config::Config::builder()
            .set_default("api_base_url", defaults.api_base_url)?
            .set_default("quiescence_ms", defaults.quiescence_ms)?
            .set_default("clear_progress_ms", defaults.clear_progress_ms)?
            .set_default("max_file_size", defaults.max_file_size)?
            .set_default("upload_concurrency", defaults.upload_concurrency as u64)?
            .set_default("private_uploads", defaults.private_uploads)?
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(PROJECT_NAME.as_str()).try_parsing(true))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn clear_progress_after(&self) -> Duration {
        Duration::from_millis(self.clear_progress_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.quiescence_ms, 500);
        assert_eq!(config.clear_progress_ms, 2000);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "api_base_url = \"https://volt.example.com\"\nquiescence_ms = 250\n",
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://volt.example.com");
        assert_eq!(config.quiescence(), Duration::from_millis(250));
        assert_eq!(config.upload_concurrency, 3);
    }
}
