//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// A social platform the backend knows how to publish to.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformInfo {
  /// Wire name sent in the publish request.
  pub name: String,
  pub display_name: String,
}

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub default_api_url: String,

  // Search-as-you-type
  pub search_debounce_ms: u64,

  // Notifications
  pub toast_secs: u64,

  // Statistics
  pub popular_tag_limit: usize,

  // HTTP
  pub request_timeout_secs: u64,
  pub upload_timeout_secs: u64,
  pub upload_chunk_bytes: usize,
  pub allowed_extensions: Vec<String>,

  // Publishing
  pub platforms: Vec<PlatformInfo>,

  // Event loop
  pub poll_interval_ms: u64,
}

impl Constants {
  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }

  pub fn toast_lifetime(&self) -> Duration {
    Duration::from_secs(self.toast_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed every test fails on first access.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.search_debounce(), Duration::from_millis(300));
    assert_eq!(c.popular_tag_limit, 10);
    assert!(c.upload_chunk_bytes > 0);
  }

  #[test]
  fn embedded_constants_list_known_platforms() {
    let names: Vec<&str> = constants().platforms.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["instagram", "tiktok", "facebook", "twitter"]);
  }

  #[test]
  fn embedded_constants_allow_common_video_extensions() {
    let exts = &constants().allowed_extensions;
    for ext in ["mp4", "mov", "webm"] {
      assert!(exts.iter().any(|e| e == ext), "missing {ext}");
    }
  }
}
