use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const API_URL_ENV: &str = "TUTORCACHE_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
  /// Path of the token refresh endpoint, relative to `url`
  pub refresh_path: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8080/api".to_string(),
      refresh_path: "/auth/refresh".to_string(),
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  /// Base url, with `TUTORCACHE_API_URL` taking precedence.
  pub fn resolved_url(&self) -> String {
    self.url_with_override(std::env::var(API_URL_ENV).ok())
  }

  fn url_with_override(&self, env: Option<String>) -> String {
    env
      .filter(|u| !u.trim().is_empty())
      .unwrap_or_else(|| self.url.clone())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Entries older than this count as stale. Unset means entries only go
  /// stale through invalidation.
  #[serde(default)]
  pub stale_time_secs: Option<u64>,
}

impl CacheConfig {
  pub fn stale_time(&self) -> Option<chrono::Duration> {
    self
      .stale_time_secs
      .and_then(|secs| i64::try_from(secs).ok())
      .map(chrono::Duration::seconds)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// `EnvFilter` directive used when `RUST_LOG` is unset
  pub filter: Option<String>,
  /// Write daily rolling log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tutorcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tutorcache/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("tutorcache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tutorcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml_str(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }
}
