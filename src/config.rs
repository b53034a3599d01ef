//! Configuration management for gztarchiver using the prefer crate.
//!
//! Settings come from (lowest to highest priority): built-in defaults, an
//! optional config file (TOML, YAML or JSON by extension), `GZTARCHIVER_*`
//! environment variables, and finally command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name prefer searches its standard config locations for.
pub const APP_NAME: &str = "gztarchiver";

/// Default User-Agent for archive requests.
pub const USER_AGENT: &str = concat!("gztarchiver/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Typed runtime settings, validated once at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the archive hierarchy (`<archive_dir>/<year>/...`).
    pub archive_dir: PathBuf,
    /// Maximum number of fetches in flight.
    pub concurrency: usize,
    /// Minimum delay between two requests to the origin.
    pub request_delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Failed attempts after which a key is skipped permanently.
    pub max_retries: u32,
    /// Smallest size (bytes) accepted as a complete artifact.
    pub min_file_size: u64,
    /// Candidates processed per invocation.
    pub batch_size: usize,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        let archive_dir = dirs::home_dir()
            .map(|home| home.join("gazette-archive"))
            .unwrap_or_else(|| PathBuf::from("gazette-archive"));

        Self {
            archive_dir,
            concurrency: 2,
            request_delay_ms: 1000,
            request_timeout_secs: 30,
            max_retries: 3,
            min_file_size: 1024,
            batch_size: 100,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    /// Load a config file, choosing the format by extension.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut settings: Settings = match ext {
            "json" => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            _ => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };

        // Relative archive dirs are relative to the config file, not the CWD.
        settings.archive_dir = resolve_path(&settings.archive_dir, path.parent());
        Ok(settings)
    }

    /// Find a config file in prefer's standard locations.
    pub async fn discover() -> Option<PathBuf> {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => pref_config.source_path().map(|p| p.to_path_buf()),
            Err(_) => {
                tracing::debug!("no {} config file discovered", APP_NAME);
                None
            }
        }
    }

    /// Apply `GZTARCHIVER_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var("GZTARCHIVER_ARCHIVE_DIR") {
            self.archive_dir = resolve_path(Path::new(&dir), None);
        }
        if let Some(v) = env_parse("GZTARCHIVER_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("GZTARCHIVER_CONCURRENCY")? {
            self.concurrency = v;
        }
        if let Some(v) = env_parse("GZTARCHIVER_REQUEST_DELAY_MS")? {
            self.request_delay_ms = v;
        }
        if let Some(v) = env_parse("GZTARCHIVER_BATCH_SIZE")? {
            self.batch_size = v;
        }
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archive_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("archive_dir must not be empty".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding one year's artifacts, ledgers and checkpoint.
    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.archive_dir.join(year.to_string())
    }
}

/// Load settings from an explicit path, or the discovered config file, then
/// apply environment overrides and validate.
pub async fn load_settings(config_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => Settings::discover().await,
    };

    let settings = match path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            Settings::load_from_path(&path)?
        }
        None => Settings::default(),
    };

    let settings = settings.with_env_overrides()?;
    settings.validate()?;
    Ok(settings)
}

/// Expand `~` and resolve relative paths against `base`.
fn resolve_path(path: &Path, base: Option<&Path>) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref());

    match base {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.min_file_size, 1024);
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.request_delay(), Duration::from_secs(1));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_toml_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                archive_dir = "archive"
                max_retries = 5
                batch_size = 25
            "#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(settings.archive_dir, dir.path().join("archive"));
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.concurrency, 2);
    }

    #[test]
    fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("config.yaml");
        std::fs::write(&yaml, "concurrency: 4\nrequest_delay_ms: 250\n").unwrap();
        let settings = Settings::load_from_path(&yaml).unwrap();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.request_delay_ms, 250);

        let json = dir.path().join("config.json");
        std::fs::write(&json, r#"{"min_file_size": 10}"#).unwrap();
        let settings = Settings::load_from_path(&json).unwrap();
        assert_eq!(settings.min_file_size, 10);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency = \"many\"").unwrap();

        let err = Settings::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut settings = Settings::default();
        settings.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.batch_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.max_retries = 0;
        assert!(settings.validate().is_err());
    }

    #[tokio::test]
    async fn test_explicit_config_path_skips_discovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("explicit.yaml");
        std::fs::write(&path, "archive_dir: store\nbatch_size: 7\n").unwrap();

        let settings = load_settings(Some(&path)).await.unwrap();
        assert_eq!(settings.archive_dir, dir.path().join("store"));
        assert_eq!(settings.batch_size, 7);
    }

    #[tokio::test]
    async fn test_explicit_config_path_must_exist() {
        let dir = tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("missing.toml")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_year_dir() {
        let settings = Settings {
            archive_dir: PathBuf::from("/data/archive"),
            ..Settings::default()
        };
        assert_eq!(settings.year_dir(2024), PathBuf::from("/data/archive/2024"));
    }
}
