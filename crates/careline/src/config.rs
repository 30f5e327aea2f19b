//! Application configuration and on-disk locations.
//!
//! Settings come from `config.toml` with `CARELINE__SECTION__KEY`
//! environment overrides on top.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::auth::AuthConfig;
use crate::notify::NotificationsConfig;

pub const APP_NAME: &str = "careline";

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "careline.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    pub auth: AuthConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `~` and `$VAR` are expanded.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<String>,
    pub state_dir: Option<String>,
}

impl AppConfig {
    /// Read `path` (optional) and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let prefix = env_prefix();
        let mut config: AppConfig = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(&prefix).separator("__"))
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?
            .try_deserialize()
            .context("parsing configuration")?;

        if let Some(file) = config.logging.file.take() {
            config.logging.file = Some(expand(&file)?.display().to_string());
        }
        Ok(config)
    }

    /// Write the defaults to `path` with a short header.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }

        let body = toml::to_string_pretty(&AppConfig::default())
            .context("serializing default config")?;
        let header = format!(
            "# {APP_NAME} configuration\n# Override any key with {}__SECTION__KEY\n\n",
            env_prefix()
        );
        fs::write(path, header + &body)
            .with_context(|| format!("writing config file {}", path.display()))
    }

    /// Configured database file, or `careline.db` under `data_dir`.
    pub fn database_path(&self, data_dir: &Path) -> Result<PathBuf> {
        match self.database.path.as_deref() {
            Some(path) => expand(path),
            None => Ok(data_dir.join(DATABASE_FILE)),
        }
    }
}

/// Where the config file, database and runtime state live.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// XDG locations, with `--config` taking a file or a directory.
    pub fn discover(config_override: Option<&Path>) -> Result<Self> {
        let config_file = match config_override {
            Some(path) => {
                let path = expand_path(path)?;
                if path.is_dir() {
                    path.join(CONFIG_FILE)
                } else {
                    path
                }
            }
            None => app_dir("XDG_CONFIG_HOME", dirs::config_dir, &[".config"])?.join(CONFIG_FILE),
        };

        Ok(Self {
            config_file,
            data_dir: app_dir("XDG_DATA_HOME", dirs::data_dir, &[".local", "share"])?,
            state_dir: app_dir("XDG_STATE_HOME", dirs::state_dir, &[".local", "state"])?,
        })
    }

    /// Apply `[paths]` from the loaded configuration.
    pub fn with_overrides(mut self, config: &PathsConfig) -> Result<Self> {
        if let Some(dir) = config.data_dir.as_deref() {
            self.data_dir = expand(dir)?;
        }
        if let Some(dir) = config.state_dir.as_deref() {
            self.state_dir = expand(dir)?;
        }
        Ok(self)
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(())
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}, state: {}",
            self.config_file.display(),
            self.data_dir.display(),
            self.state_dir.display()
        )
    }
}

/// `$XDG_*/careline`, then the platform directory, then `~/<fallback>/careline`.
fn app_dir(xdg_var: &str, platform: fn() -> Option<PathBuf>, fallback: &[&str]) -> Result<PathBuf> {
    let base = std::env::var_os(xdg_var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(platform)
        .or_else(|| {
            dirs::home_dir().map(|home| fallback.iter().fold(home, |dir, part| dir.join(part)))
        })
        .ok_or_else(|| anyhow!("unable to determine a directory for {xdg_var}"))?;
    Ok(base.join(APP_NAME))
}

/// Expand `~` and environment variables.
pub fn expand(text: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(text).with_context(|| format!("expanding path {text}"))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

pub fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => expand(text),
        None => Ok(path.to_path_buf()),
    }
}

/// `CARELINE`, the environment override prefix.
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
