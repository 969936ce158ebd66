use crate::core::download::{
    DownloadOptions, DEFAULT_CHUNK_SIZE, DEFAULT_REPORT_INTERVAL, DEFAULT_STALL_TIMEOUT,
};
use crate::core::registry::Registry;
use crate::error::{DatasetError, Result};
use crate::utils::fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the base directory (`~/.omr-datasets`).
pub const HOME_ENV: &str = "OMR_DATASETS_HOME";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Default parent directory for extracted datasets.
    pub data_dir: PathBuf,
    /// Where downloaded archives are kept.
    pub archive_dir: PathBuf,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Seconds without any data before a transfer is abandoned.
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
    #[serde(default = "default_report_interval")]
    pub report_interval: u32,
    #[serde(default = "default_atomic_downloads")]
    pub atomic_downloads: bool,
    /// Extra `[[dataset]]` definitions merged over the built-in registry.
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_stall_timeout() -> u64 {
    DEFAULT_STALL_TIMEOUT.as_secs()
}

fn default_report_interval() -> u32 {
    DEFAULT_REPORT_INTERVAL
}

fn default_atomic_downloads() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = get_base_dir().unwrap_or_else(|_| PathBuf::from(".omr-datasets"));
        Self::with_base_dir(&base_dir)
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Self::with_base_dir(&get_base_dir()?))
    }

    pub fn with_base_dir(base_dir: &Path) -> Self {
        Config {
            data_dir: base_dir.join("data"),
            archive_dir: base_dir.join("archives"),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: None,
            stall_timeout_secs: default_stall_timeout(),
            report_interval: default_report_interval(),
            atomic_downloads: default_atomic_downloads(),
            registry_file: None,
        }
    }

    /// Loads the user config, writing a default one on first use.
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            let config = Self::new()?;
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::ensure_dir_exists(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 {
            return Err(DatasetError::config_error(
                "connect_timeout_secs must be greater than zero",
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(DatasetError::config_error(
                "timeout_secs must be greater than zero when set",
            ));
        }
        if self.stall_timeout_secs == 0 {
            return Err(DatasetError::config_error(
                "stall_timeout_secs must be greater than zero",
            ));
        }
        if self.report_interval == 0 {
            return Err(DatasetError::config_error(
                "report_interval must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_interval: self.report_interval,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            stall_timeout: Some(Duration::from_secs(self.stall_timeout_secs)),
            atomic: self.atomic_downloads,
        }
    }

    /// Built-in datasets with the user's registry file applied on top.
    pub fn registry(&self) -> Result<Registry> {
        let builtin = Registry::builtin();
        match &self.registry_file {
            Some(path) => Ok(builtin.with_overrides(Registry::load(path)?)),
            None => Ok(builtin),
        }
    }

    pub fn get_dataset_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

fn get_base_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::home_dir()
        .map(|home| home.join(".omr-datasets"))
        .ok_or(DatasetError::HomeDirectoryNotFound)
}

fn get_config_path() -> Result<PathBuf> {
    Ok(get_base_dir()?.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_layout() {
        let config = Config::with_base_dir(Path::new("/srv/omr"));
        assert_eq!(config.data_dir, PathBuf::from("/srv/omr/data"));
        assert_eq!(config.archive_dir, PathBuf::from("/srv/omr/archives"));
        assert_eq!(config.get_dataset_dir("homus"), PathBuf::from("/srv/omr/data/homus"));
        assert!(config.atomic_downloads);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::with_base_dir(dir.path());
        config.timeout_secs = Some(600);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"data_dir": "/d", "archive_dir": "/a"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.report_interval, 100);
        assert_eq!(config.timeout_secs, None);
        assert_eq!(config.stall_timeout_secs, 60);
        assert!(config.atomic_downloads);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/d", "archive_dir": "/a", "report_interval": 0}"#,
        )
        .unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(DatasetError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_download_options_mapping() {
        let mut config = Config::with_base_dir(Path::new("/srv/omr"));
        config.timeout_secs = Some(120);
        config.atomic_downloads = false;

        let options = config.download_options();
        assert_eq!(options.chunk_size, 8192);
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.timeout, Some(Duration::from_secs(120)));
        assert_eq!(options.stall_timeout, Some(Duration::from_secs(60)));
        assert!(!options.atomic);
    }

    #[test]
    fn test_zero_stall_timeout_rejected() {
        let mut config = Config::with_base_dir(Path::new("/srv/omr"));
        config.stall_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(DatasetError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_registry_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("datasets.toml");
        std::fs::write(
            &registry_path,
            "[[dataset]]\nname = \"custom\"\nurl = \"https://example.org/custom.zip\"\n",
        )
        .unwrap();

        let mut config = Config::with_base_dir(dir.path());
        config.registry_file = Some(registry_path);

        let registry = config.registry().unwrap();
        assert!(registry.get("custom").is_some());
        assert!(registry.get("homus").is_some());
    }
}
