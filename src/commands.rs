//! Headless subcommands that print the catalog instead of starting the TUI.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use tracing::info;

use crate::api::ApiClient;
use crate::catalog::{self, FilterCriteria, SortKey, TagCount, VideoRecord};
use crate::constants::constants;
use crate::format::{format_date, format_file_size};

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
  /// Case-insensitive substring matched against title, description and tags
  #[arg(short, long, default_value = "")]
  pub search: String,
  /// Only videos carrying exactly this tag
  #[arg(short, long)]
  pub tag: Option<String>,
  /// Sort key: date-desc, date-asc, title-asc or title-desc
  #[arg(long, default_value = "date-desc")]
  pub sort: SortKey,
  /// Print the matching records as JSON
  #[arg(long)]
  pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TagsArgs {
  /// How many of the most used tags to print
  #[arg(short, long)]
  pub limit: Option<usize>,
  /// Print every distinct tag in sorted order instead of the most used ones
  #[arg(long, conflicts_with = "limit")]
  pub all: bool,
}

impl ListArgs {
  fn criteria(&self) -> FilterCriteria {
    FilterCriteria { search_term: self.search.clone(), selected_tag: self.tag.clone(), sort: self.sort }
  }
}

pub async fn list(api: &ApiClient, args: &ListArgs) -> Result<()> {
  let records = api.list_videos().await.context("Failed to load videos")?;
  let view = catalog::apply(&records, &args.criteria());
  info!(total = records.len(), shown = view.len(), "list");

  let mut out = std::io::stdout().lock();
  if args.json {
    serde_json::to_writer_pretty(&mut out, &view)?;
    writeln!(out)?;
  } else {
    for line in list_lines(&view) {
      writeln!(out, "{}", line)?;
    }
  }
  Ok(())
}

pub async fn tags(api: &ApiClient, args: &TagsArgs) -> Result<()> {
  let records = api.list_videos().await.context("Failed to load videos")?;

  let mut out = std::io::stdout().lock();
  if args.all {
    for tag in catalog::derive_tag_universe(&records) {
      writeln!(out, "{}", tag)?;
    }
  } else {
    let limit = args.limit.unwrap_or(constants().popular_tag_limit);
    for line in tag_lines(&catalog::derive_tag_frequency(&records, limit)) {
      writeln!(out, "{}", line)?;
    }
  }
  Ok(())
}

fn list_lines(view: &[&VideoRecord]) -> Vec<String> {
  view
    .iter()
    .map(|r| {
      let mut line =
        format!("{:>5}  {}  {:>10}  {}", r.id, format_date(r.upload_date.as_ref()), format_file_size(r.file_size), r.title);
      if !r.tags.is_empty() {
        line.push_str(&format!("  [{}]", r.tag_line()));
      }
      line
    })
    .collect()
}

fn tag_lines(counts: &[TagCount]) -> Vec<String> {
  let width = counts.iter().map(|t| t.count.to_string().len()).max().unwrap_or(1);
  counts.iter().map(|t| format!("{:>width$}  {}", t.count, t.tag, width = width)).collect()
}
