//! Human-readable formatting for sizes, durations, dates and narrow columns.

use chrono::NaiveDateTime;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Format a byte count with 1024-based units, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
  if bytes == 0 {
    return "0 Bytes".to_string();
  }
  let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
  let exp = exp.min(UNITS.len() - 1);
  let value = bytes as f64 / 1024f64.powi(exp as i32);
  let rounded = format!("{:.2}", value);
  let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
  format!("{} {}", trimmed, UNITS[exp])
}

/// Format seconds as `N min` or `Hh Mmin`.
pub fn format_duration(seconds: f64) -> String {
  if !seconds.is_finite() || seconds < 60.0 {
    return "0 min".to_string();
  }
  let minutes = (seconds / 60.0).floor() as u64;
  let hours = minutes / 60;
  if hours > 0 { format!("{}h {}min", hours, minutes % 60) } else { format!("{} min", minutes) }
}

/// Format a clip length as `m:ss` or `h:mm:ss`.
pub fn format_clip_length(seconds: f64) -> String {
  if !seconds.is_finite() || seconds < 0.0 {
    return "—".to_string();
  }
  let total = seconds.round() as u64;
  let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

pub fn format_date(date: Option<&NaiveDateTime>) -> String {
  match date {
    Some(d) => d.format("%d %b %Y %H:%M").to_string(),
    None => "—".to_string(),
  }
}

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` display columns, appending "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
  if UnicodeWidthStr::width(s) <= max_width {
    return s.to_string();
  }
  if max_width == 0 {
    return String::new();
  }
  let budget = max_width - 1;
  let mut used = 0;
  let mut truncated = String::new();
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w > budget {
      break;
    }
    used += w;
    truncated.push(c);
  }
  format!("{}…", truncated)
}
