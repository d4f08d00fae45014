use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::catalog::SortKey;
use crate::constants::constants;

/// Environment variable that overrides the saved API URL.
pub const API_URL_ENV: &str = "REEL_API_URL";

/// User preferences persisted to `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_url: Option<String>,
  pub theme_name: Option<String>,
  #[serde(default, deserialize_with = "lenient_sort")]
  pub sort: Option<SortKey>,
}

/// An unrecognised sort falls back to the default instead of discarding the
/// rest of the prefs file.
fn lenient_sort<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SortKey>, D::Error> {
  let raw = Option::<toml::Value>::deserialize(deserializer)?;
  Ok(raw.and_then(|value| match value.as_str().map(str::parse::<SortKey>) {
    Some(Ok(sort)) => Some(sort),
    _ => {
      warn!(value = %value, "config: ignoring invalid sort");
      None
    }
  }))
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "reel")
}

/// Directory for the log file when `--log-dir` isn't given.
pub fn default_log_dir() -> PathBuf {
  project_dirs().map(|d| d.data_local_dir().to_path_buf()).unwrap_or_else(std::env::temp_dir)
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(&config_file) {
        match Self::parse(&content) {
          Some(config) => return config,
          None => warn!(path = %config_file.display(), "config: ignoring unreadable prefs file"),
        }
      }
    }
    Self::default()
  }

  fn parse(content: &str) -> Option<Self> {
    toml::from_str(content).ok()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self)
          && let Err(e) = std::fs::write(&config_file, content)
        {
          warn!(err = %e, path = %config_file.display(), "config: failed to save prefs");
        }
      }
    }
  }

  /// API URL by precedence: command line, environment, prefs file, built-in default.
  pub fn resolve_api_url(&self, cli: Option<&str>, env: Option<&str>) -> String {
    let given = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    given(cli)
      .or_else(|| given(env))
      .or_else(|| given(self.api_url.as_deref()))
      .unwrap_or_else(|| constants().default_api_url.clone())
  }
}
