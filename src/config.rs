use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::QueryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the art-collection API
  pub base_url: String,
  /// IIIF image server used to build image links
  pub iiif_url: String,
  /// Artworks per page when none is given on the command line
  pub page_size: u32,
  /// Transport timeout for a single request
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.artic.edu/api/v1".to_string(),
      iiif_url: "https://www.artic.edu/iiif/2".to_string(),
      page_size: 12,
      timeout_secs: 15,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub stale_time_secs: u64,
  pub gc_time_secs: u64,
  /// Keep query results on disk so they are available offline after a restart
  pub persist: bool,
  pub refetch_on_reconnect: bool,
  pub refetch_on_window_focus: bool,
  pub max_retries: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let policy = QueryPolicy::default();
    Self {
      stale_time_secs: policy.stale_time.as_secs(),
      gc_time_secs: policy.gc_time.as_secs(),
      persist: true,
      refetch_on_reconnect: policy.refetch_on_reconnect,
      refetch_on_window_focus: policy.refetch_on_window_focus,
      max_retries: policy.max_retries,
    }
  }
}

impl CacheConfig {
  pub fn policy(&self) -> QueryPolicy {
    QueryPolicy {
      stale_time: Duration::from_secs(self.stale_time_secs),
      gc_time: Duration::from_secs(self.gc_time_secs),
      refetch_on_window_focus: self.refetch_on_window_focus,
      refetch_on_reconnect: self.refetch_on_reconnect,
      max_retries: self.max_retries,
      ..QueryPolicy::default()
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./artvault.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/artvault/config.yaml
  ///
  /// Without a file the built-in defaults are used.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    Ok(config.with_env_overrides())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("artvault.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("artvault").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Apply `ARTVAULT_API_URL` on top of the file.
  fn with_env_overrides(mut self) -> Self {
    if let Ok(url) = std::env::var("ARTVAULT_API_URL") {
      if !url.trim().is_empty() {
        self.api.base_url = url;
      }
    }
    self
  }
}
