//! Catalog records and the client-side view pipeline.
//!
//! Everything here is a pure function of its inputs: the UI hands in the
//! latest record snapshot plus the current [`FilterCriteria`] and gets back a
//! freshly derived ordering. Nothing in this module mutates a record.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// --- Records ---

/// Publication state of a video on one social platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
  Pending,
  Published,
  Failed,
  #[serde(other)]
  Unknown,
}

/// One attempt to publish a video to a platform, as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
  #[serde(default)]
  pub id: u64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub platform: String,
  #[serde(default = "unknown_status", deserialize_with = "status_or_unknown")]
  pub status: PublicationStatus,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub platform_post_id: Option<String>,
  #[serde(default, deserialize_with = "lenient_timestamp")]
  pub published_at: Option<NaiveDateTime>,
}

/// A video's metadata as known to the catalog.
///
/// Deserialisation is deliberately forgiving: `null` or missing text, tags,
/// sizes and publication lists become empty values, and an unparseable
/// upload date becomes `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
  pub id: u64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub title: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub description: String,
  /// Display order is the backend's insertion order.
  #[serde(default, deserialize_with = "lenient_tags")]
  pub tags: Vec<String>,
  #[serde(default, deserialize_with = "lenient_timestamp")]
  pub upload_date: Option<NaiveDateTime>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub file_size: u64,
  /// Length in seconds, when the backend managed to probe it.
  #[serde(default)]
  pub duration: Option<f64>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub filename: String,
  #[serde(default)]
  pub original_filename: Option<String>,
  #[serde(default, deserialize_with = "lenient_publications")]
  pub publications: Vec<Publication>,
}

impl VideoRecord {
  /// Tags joined for single-line display.
  pub fn tag_line(&self) -> String {
    self.tags.join(", ")
  }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tags as a list of strings; non-string entries are dropped and a single
/// comma-separated string is split.
fn lenient_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let tags = match Option::<serde_json::Value>::deserialize(deserializer)? {
    Some(serde_json::Value::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
    Some(serde_json::Value::String(joined)) => {
      joined.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
    }
    _ => Vec::new(),
  };
  Ok(tags)
}

fn lenient_publications<'de, D>(deserializer: D) -> std::result::Result<Vec<Publication>, D::Error>
where
  D: Deserializer<'de>,
{
  let items = match Option::<serde_json::Value>::deserialize(deserializer)? {
    Some(serde_json::Value::Array(items)) => items,
    _ => return Ok(Vec::new()),
  };
  Ok(items.into_iter().filter_map(|item| serde_json::from_value(item).ok()).collect())
}

/// Decode each raw record on its own, skipping the ones that cannot be read
/// so a single bad entry never hides the rest of the catalog.
pub fn decode_records(raw: Vec<serde_json::Value>) -> Vec<VideoRecord> {
  raw
    .into_iter()
    .filter_map(|value| match serde_json::from_value::<VideoRecord>(value) {
      Ok(record) => Some(record),
      Err(e) => {
        warn!(err = %e, "catalog: skipping unreadable record");
        None
      }
    })
    .collect()
}

fn unknown_status() -> PublicationStatus {
  PublicationStatus::Unknown
}

fn status_or_unknown<'de, D>(deserializer: D) -> std::result::Result<PublicationStatus, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<PublicationStatus>::deserialize(deserializer)?.unwrap_or(PublicationStatus::Unknown))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(serde_json::Value::as_str).and_then(parse_timestamp))
}

/// Parse the timestamp shapes the backend emits.
///
/// Offset-carrying values are converted to UTC; naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.naive_utc());
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
      return Some(dt);
    }
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
}

// --- Criteria ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
  #[default]
  Date,
  Title,
}

impl SortField {
  pub const ALL: [SortField; 2] = [SortField::Date, SortField::Title];

  pub fn label(self) -> &'static str {
    match self {
      SortField::Date => "date",
      SortField::Title => "title",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
  Ascending,
  #[default]
  Descending,
}

impl SortOrder {
  pub fn label(self) -> &'static str {
    match self {
      SortOrder::Ascending => "asc",
      SortOrder::Descending => "desc",
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      SortOrder::Ascending => SortOrder::Descending,
      SortOrder::Descending => SortOrder::Ascending,
    }
  }
}

/// Which field to sort on and in which direction. Textual form: `date-desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortKey {
  pub field: SortField,
  pub order: SortOrder,
}

impl SortKey {
  pub fn new(field: SortField, order: SortOrder) -> Self {
    Self { field, order }
  }

  /// Compare two records under this key.
  ///
  /// Descending reverses the comparator rather than the output, so equal
  /// keys keep their original relative order in both directions.
  pub fn compare(&self, a: &VideoRecord, b: &VideoRecord) -> Ordering {
    let ord = match self.field {
      SortField::Date => a.upload_date.cmp(&b.upload_date),
      SortField::Title => {
        a.title.chars().flat_map(char::to_lowercase).cmp(b.title.chars().flat_map(char::to_lowercase))
      }
    };
    match self.order {
      SortOrder::Ascending => ord,
      SortOrder::Descending => ord.reverse(),
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.field.label(), self.order.label())
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    let (field, order) = s.trim().split_once('-').ok_or_else(|| anyhow!("sort key '{}' is not <field>-<order>", s))?;
    let field = match field.to_lowercase().as_str() {
      "date" => SortField::Date,
      "title" => SortField::Title,
      other => return Err(anyhow!("unknown sort field '{}' (expected date or title)", other)),
    };
    let order = match order.to_lowercase().as_str() {
      "asc" => SortOrder::Ascending,
      "desc" => SortOrder::Descending,
      other => return Err(anyhow!("unknown sort order '{}' (expected asc or desc)", other)),
    };
    Ok(Self { field, order })
  }
}

impl TryFrom<String> for SortKey {
  type Error = anyhow::Error;

  fn try_from(value: String) -> Result<Self> {
    value.parse()
  }
}

impl From<SortKey> for String {
  fn from(key: SortKey) -> Self {
    key.to_string()
  }
}

/// The user's current search / tag / sort configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
  /// Case-insensitive substring, matched against title, description and tags.
  /// Only the empty string disables it.
  pub search_term: String,
  /// Exact, case-sensitive tag filter.
  pub selected_tag: Option<String>,
  pub sort: SortKey,
}

impl FilterCriteria {
  /// Whether a record passes both the search and the tag filter.
  pub fn matches(&self, record: &VideoRecord) -> bool {
    self.matches_needle(record, &self.search_term.to_lowercase())
  }

  fn matches_needle(&self, record: &VideoRecord, needle: &str) -> bool {
    let matches_search = needle.is_empty()
      || record.title.to_lowercase().contains(needle)
      || record.description.to_lowercase().contains(needle)
      || record.tags.iter().any(|tag| tag.to_lowercase().contains(needle));

    let matches_tag = match self.selected_tag.as_deref() {
      None | Some("") => true,
      Some(wanted) => record.tags.iter().any(|tag| tag == wanted),
    };

    matches_search && matches_tag
  }

  pub fn is_unfiltered(&self) -> bool {
    self.search_term.is_empty() && self.selected_tag.as_deref().is_none_or(str::is_empty)
  }
}

// --- View pipeline ---

/// Filter and sort `records`, returning positions into the input slice.
///
/// The sort is stable; records with equal keys stay in input order.
pub fn apply_indices(records: &[VideoRecord], criteria: &FilterCriteria) -> Vec<usize> {
  let needle = criteria.search_term.to_lowercase();
  let mut indices: Vec<usize> = records
    .iter()
    .enumerate()
    .filter(|(_, record)| criteria.matches_needle(record, &needle))
    .map(|(i, _)| i)
    .collect();
  indices.sort_by(|&a, &b| criteria.sort.compare(&records[a], &records[b]));
  indices
}

/// Filter and sort `records`, borrowing the survivors in display order.
pub fn apply<'a>(records: &'a [VideoRecord], criteria: &FilterCriteria) -> Vec<&'a VideoRecord> {
  apply_indices(records, criteria).into_iter().map(|i| &records[i]).collect()
}

/// Every distinct tag across `records`, in lexicographic (byte) order.
pub fn derive_tag_universe(records: &[VideoRecord]) -> Vec<String> {
  let tags: BTreeSet<&str> = records.iter().flat_map(|r| r.tags.iter().map(String::as_str)).collect();
  tags.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
  pub tag: String,
  pub count: usize,
}

/// The `limit` most used tags, most frequent first.
///
/// Equal counts keep first-seen order (scanning records, then each record's
/// tags). A tag repeated within one record counts once per occurrence.
pub fn derive_tag_frequency(records: &[VideoRecord], limit: usize) -> Vec<TagCount> {
  let mut counts: Vec<TagCount> = Vec::new();
  let mut positions: HashMap<&str, usize> = HashMap::new();

  for tag in records.iter().flat_map(|r| r.tags.iter()) {
    match positions.get(tag.as_str()) {
      Some(&pos) => counts[pos].count += 1,
      None => {
        positions.insert(tag, counts.len());
        counts.push(TagCount { tag: tag.clone(), count: 1 });
      }
    }
  }

  counts.sort_by(|a, b| b.count.cmp(&a.count));
  counts.truncate(limit);
  counts
}

/// Aggregate figures shown on the statistics screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStats {
  pub total_videos: usize,
  pub total_bytes: u64,
  pub total_duration_secs: f64,
  pub total_publications: usize,
}

impl CatalogStats {
  pub fn from_records(records: &[VideoRecord]) -> Self {
    records.iter().fold(Self::default(), |mut acc, r| {
      acc.total_videos += 1;
      acc.total_bytes = acc.total_bytes.saturating_add(r.file_size);
      acc.total_duration_secs += r.duration.unwrap_or(0.0).max(0.0);
      acc.total_publications += r.publications.len();
      acc
    })
  }
}
