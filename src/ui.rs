use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Flex, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, Gauge, List, ListItem, Padding, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppMode, ToastLevel, UploadFocus};
use crate::catalog::{PublicationStatus, VideoRecord};
use crate::constants::constants;
use crate::format::{display_width, format_clip_length, format_date, format_duration, format_file_size, truncate_str};
use crate::input::TextField;
use crate::theme::Theme;

// --- Helpers ---

fn panel<'a>(theme: &Theme, title: impl Into<Line<'a>>) -> Block<'a> {
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
}

/// A `width` x `height` rectangle centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let [row] = Layout::vertical([Constraint::Length(height.min(area.height))]).flex(Flex::Center).areas(area);
  let [cell] = Layout::horizontal([Constraint::Length(width.min(area.width))]).flex(Flex::Center).areas(row);
  cell
}

fn label_value<'a>(theme: &Theme, label: &'a str, value: String) -> Line<'a> {
  Line::from(vec![
    Span::styled(format!("{:<12}", label), Style::default().fg(theme.muted)),
    Span::styled(value, Style::default().fg(theme.fg)),
  ])
}

/// Right-pad `s` with spaces to `width` display columns.
fn pad_to_width(s: &str, width: usize) -> String {
  format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, search_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_search(frame, app, search_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(vec![
    Span::styled(" ▶ reel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(app.api.base_url(), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

/// Draw a single-line text field inside a bordered box, scrolling horizontally
/// to keep the cursor visible.
fn render_text_field(frame: &mut Frame, theme: &Theme, field: &mut TextField, title: Line, focused: bool, area: Rect) {
  let border_color = if focused { theme.accent } else { theme.border };
  let block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = (area.width.saturating_sub(4) as usize).max(1);
  let cursor_col = display_width(field.value(), field.cursor());

  if cursor_col < field.scroll {
    field.scroll = cursor_col;
  } else if cursor_col >= field.scroll + inner_w {
    field.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let scroll = field.scroll;
  let visible: String = field
    .value()
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let mut title = vec![Span::raw(" Search ")];
  if let Some(tag) = &app.criteria.selected_tag {
    title.push(Span::styled(format!("#{} ", tag), Style::default().fg(theme.tag)));
  }
  title.push(Span::styled(format!("⇅ {} ", app.criteria.sort), Style::default().fg(theme.muted)));

  let focused = app.mode == AppMode::Search;
  render_text_field(frame, theme, &mut app.search, Line::from(title), focused, area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  match app.mode {
    AppMode::Browse | AppMode::Search => render_list(frame, app, area),
    AppMode::Detail => render_detail(frame, app, area),
    AppMode::ConfirmDelete => {
      render_detail(frame, app, area);
      render_confirm_delete(frame, app, area);
    }
    AppMode::Publish => {
      render_detail(frame, app, area);
      render_publish(frame, app, area);
    }
    AppMode::Upload => render_upload(frame, app, area),
    AppMode::Stats => render_stats(frame, app, area),
  }
}

fn render_list(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  if app.view.is_empty() {
    let message = if !app.loaded {
      "Loading videos…"
    } else if app.records.is_empty() {
      "No videos yet. Press u to upload one."
    } else {
      "No videos match the current filters."
    };
    let text = vec![Line::from(""), Line::from(Span::styled(message, Style::default().fg(theme.muted)))];
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(panel(theme, " Videos "));
    frame.render_widget(paragraph, area);
    return;
  }

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .view
    .iter()
    .enumerate()
    .map(|(i, &idx)| {
      let record = &app.records[idx];
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };
      ListItem::new(list_row(theme, record, fg, inner_w)).bg(bg)
    })
    .collect();

  let title = if app.criteria.is_unfiltered() {
    format!(" Videos ({}) ", app.records.len())
  } else {
    format!(" Videos ({} of {}) ", app.view.len(), app.records.len())
  };

  let list = List::new(items)
    .block(panel(theme, title))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// `title ........ #tags  date  size`, dropping the tags first when narrow.
fn list_row<'a>(theme: &Theme, record: &VideoRecord, fg: ratatui::style::Color, width: usize) -> Line<'a> {
  let meta = format!("{}  {:>9}", format_date(record.upload_date.as_ref()), format_file_size(record.file_size));
  let tags = record.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ");

  let meta_w = meta.width();
  let mut tags_shown = String::new();
  if !tags.is_empty() && width > meta_w + 24 {
    tags_shown = truncate_str(&tags, width - meta_w - 24);
  }
  let right_w = meta_w + if tags_shown.is_empty() { 0 } else { tags_shown.width() + 2 };

  let title = truncate_str(&record.title, width.saturating_sub(right_w + 2));
  let gap = width.saturating_sub(title.width() + right_w);

  let mut spans = vec![Span::styled(title, Style::default().fg(fg)), Span::raw(" ".repeat(gap))];
  if !tags_shown.is_empty() {
    spans.push(Span::styled(tags_shown, Style::default().fg(theme.tag)));
    spans.push(Span::raw("  "));
  }
  spans.push(Span::styled(meta, Style::default().fg(theme.muted)));
  Line::from(spans)
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(record) = &app.detail else {
    frame.render_widget(panel(theme, " Video "), area);
    return;
  };

  let block = panel(theme, format!(" Video #{} ", record.id)).padding(Padding::horizontal(1));
  let inner_w = area.width.saturating_sub(4) as usize;

  let mut lines = vec![
    Line::from(Span::styled(
      truncate_str(&record.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    label_value(theme, "Uploaded", format_date(record.upload_date.as_ref())),
    label_value(theme, "Size", format_file_size(record.file_size)),
    label_value(theme, "Length", record.duration.map_or("—".to_string(), format_clip_length)),
    label_value(theme, "File", record.original_filename.clone().unwrap_or_else(|| record.filename.clone())),
  ];
  if !record.tags.is_empty() {
    lines.push(Line::from(vec![
      Span::styled(format!("{:<12}", "Tags"), Style::default().fg(theme.muted)),
      Span::styled(record.tag_line(), Style::default().fg(theme.tag)),
    ]));
  }

  lines.push(Line::from(""));
  if record.description.trim().is_empty() {
    lines.push(Line::from(Span::styled("No description.", Style::default().fg(theme.muted))));
  } else {
    lines.extend(record.description.lines().map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(theme.fg)))));
  }

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled("Publications", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))));
  if record.publications.is_empty() {
    lines.push(Line::from(Span::styled("Not published anywhere yet.", Style::default().fg(theme.muted))));
  }
  for p in &record.publications {
    let color = match p.status {
      PublicationStatus::Published => theme.success,
      PublicationStatus::Pending => theme.warning,
      PublicationStatus::Failed => theme.error,
      PublicationStatus::Unknown => theme.muted,
    };
    let mut spans = vec![
      Span::styled(format!("{:<12}", p.platform), Style::default().fg(theme.fg)),
      Span::styled(format!("{:?}", p.status).to_lowercase(), Style::default().fg(color)),
    ];
    if let Some(at) = &p.published_at {
      spans.push(Span::styled(format!("  {}", format_date(Some(at))), Style::default().fg(theme.muted)));
    }
    if let Some(msg) = &p.message {
      spans.push(Span::styled(format!("  {}", msg), Style::default().fg(theme.muted)));
    }
    lines.push(Line::from(spans));
  }

  if !app.publish_results.is_empty() {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Last publish", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))));
    for outcome in &app.publish_results {
      let (mark, color) = if outcome.success { ("✓", theme.success) } else { ("✗", theme.error) };
      lines.push(Line::from(vec![
        Span::styled(format!("{} ", mark), Style::default().fg(color)),
        Span::styled(format!("{:<10}", outcome.platform), Style::default().fg(theme.fg)),
        Span::styled(outcome.summary().to_string(), Style::default().fg(theme.muted)),
      ]));
    }
  }

  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
  frame.render_widget(paragraph, area);
}

fn render_confirm_delete(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let title = app.detail.as_ref().map_or("", |d| d.title.as_str());
  let popup = centered(area, 50, 6);
  let text = vec![
    Line::from(""),
    Line::from(Span::styled(format!("Delete \"{}\"?", truncate_str(title, 36)), Style::default().fg(theme.fg))),
    Line::from(Span::styled("This cannot be undone.", Style::default().fg(theme.muted))),
  ];
  let block = Block::bordered()
    .title(" Confirm ")
    .title_style(Style::default().fg(theme.error).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.error))
    .style(Style::default().bg(theme.bg));
  frame.render_widget(Clear, popup);
  frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(block), popup);
}

fn render_publish(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let platforms = &constants().platforms;
  let popup = centered(area, 36, platforms.len() as u16 + 4);

  let items: Vec<ListItem> = platforms
    .iter()
    .zip(&app.publish.chosen)
    .enumerate()
    .map(|(i, (p, chosen))| {
      let mark = if *chosen { "[x]" } else { "[ ]" };
      let style = if i == app.publish.cursor {
        Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(theme.fg)
      };
      ListItem::new(Line::from(format!(" {} {}", mark, p.display_name))).style(style)
    })
    .collect();

  let block = panel(theme, " Publish to ").padding(Padding::vertical(1)).style(Style::default().bg(theme.bg));
  frame.render_widget(Clear, popup);
  frame.render_widget(List::new(items).block(block), popup);
}

fn render_upload(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = panel(theme, " Upload video ").padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [path_area, title_area, desc_area, tags_area, note_area, gauge_area] = Layout::vertical([
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(inner);

  let focus = app.upload.focus;
  for (field, field_area) in UploadFocus::ALL.into_iter().zip([path_area, title_area, desc_area, tags_area]) {
    let title = Line::from(format!(" {} ", field.label()));
    render_text_field(frame, theme, app.upload.field_mut(field), title, focus == field, field_area);
  }

  let note = format!("Allowed: {}", constants().allowed_extensions.join(", "));
  frame.render_widget(Line::from(Span::styled(note, Style::default().fg(theme.muted))), note_area);

  if app.tasks.upload.is_some() {
    let (ratio, label) = match app.upload_progress {
      Some(p) => (p.ratio(), format!("{} / {}", format_file_size(p.sent), format_file_size(p.total))),
      None => (0.0, "Starting…".to_string()),
    };
    let gauge = Gauge::default()
      .gauge_style(Style::default().fg(theme.accent).bg(theme.stripe_bg))
      .ratio(ratio.clamp(0.0, 1.0))
      .label(label);
    frame.render_widget(gauge, gauge_area);
  }
}

fn render_stats(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let stats = app.stats();
  let popular = app.popular_tags();

  let [totals_area, tags_area] = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

  let totals = vec![
    Line::from(""),
    label_value(theme, "Videos", stats.total_videos.to_string()),
    label_value(theme, "Storage", format_file_size(stats.total_bytes)),
    label_value(theme, "Duration", format_duration(stats.total_duration_secs)),
    label_value(theme, "Published", stats.total_publications.to_string()),
    label_value(theme, "Tags", app.tag_universe.len().to_string()),
  ];
  frame.render_widget(Paragraph::new(totals).block(panel(theme, " Library ").padding(Padding::horizontal(1))), totals_area);

  let max = popular.first().map_or(1, |t| t.count.max(1));
  let label_w = popular.iter().map(|t| t.tag.width()).max().unwrap_or(0).min(20);
  let bar_w = (tags_area.width as usize).saturating_sub(label_w + 12).max(1);
  let mut lines = vec![Line::from("")];
  if popular.is_empty() {
    lines.push(Line::from(Span::styled("No tags yet.", Style::default().fg(theme.muted))));
  }
  for t in &popular {
    let filled = (t.count * bar_w).div_ceil(max);
    lines.push(Line::from(vec![
      Span::styled(pad_to_width(&truncate_str(&t.tag, label_w), label_w + 1), Style::default().fg(theme.tag)),
      Span::styled("█".repeat(filled), Style::default().fg(theme.accent)),
      Span::styled(format!(" {}", t.count), Style::default().fg(theme.muted)),
    ]));
  }
  frame.render_widget(Paragraph::new(lines).block(panel(theme, " Popular tags ").padding(Padding::horizontal(1))), tags_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(busy) = app.busy_label() {
    (format!(" ⏳ {}", busy), Style::default().fg(theme.status))
  } else if let Some(toast) = &app.toast {
    match toast.level {
      ToastLevel::Info => (format!(" {}", toast.message), Style::default().fg(theme.status)),
      ToastLevel::Success => (format!(" ✓ {}", toast.message), Style::default().fg(theme.success)),
      ToastLevel::Warning => (format!(" !  {}", toast.message), Style::default().fg(theme.warning)),
      ToastLevel::Error => (format!(" ⚠  {}", toast.message), Style::default().fg(theme.error)),
    }
  } else if app.loaded {
    (format!(" {} of {} videos", app.view.len(), app.records.len()), Style::default().fg(theme.muted))
  } else {
    (" Connecting…".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn footer_keys(app: &App) -> Vec<(&'static str, &'static str)> {
  match app.mode {
    AppMode::Browse => {
      let mut k = vec![("Enter", "Open"), ("/", "Search"), ("t", "Tag"), ("s", "Sort"), ("o", "Order")];
      if !app.criteria.is_unfiltered() {
        k.push(("c", "Clear"));
      }
      k.extend([("r", "Refresh"), ("u", "Upload"), ("a", "Stats"), ("q", "Quit")]);
      k
    }
    AppMode::Search => vec![("Enter", "Apply"), ("↑/↓", "Navigate"), ("Esc", "Clear")],
    AppMode::Detail => vec![("p", "Publish"), ("d", "Delete"), ("Esc", "Back")],
    AppMode::ConfirmDelete => vec![("y", "Delete"), ("n", "Cancel")],
    AppMode::Publish => vec![("Space", "Toggle"), ("j/k", "Navigate"), ("Enter", "Publish"), ("Esc", "Back")],
    AppMode::Upload => vec![("Tab", "Next field"), ("Enter", "Upload"), ("Esc", "Back")],
    AppMode::Stats => vec![("Esc", "Back")],
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut keys = footer_keys(app);
  keys.push(("^t", "Theme"));

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::catalog::tests::record;
  use crate::config::Config;
  use ratatui::{Terminal, backend::TestBackend};

  fn app() -> App {
    let mut app = App::new(ApiClient::new("http://127.0.0.1:9").unwrap(), Config::default());
    app.persist_config = false;
    app.loaded = true;
    app.set_records(vec![
      record(1, "Morning run", "2024-03-01", &["fitness"]),
      record(2, "Ramen at home", "2024-01-15", &["food", "cooking"]),
    ]);
    app
  }

  fn render(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal.draw(|f| ui(f, app)).unwrap();
    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buffer.area.height {
      for x in 0..buffer.area.width {
        out.push_str(buffer[(x, y)].symbol());
      }
      out.push('\n');
    }
    out
  }

  #[test]
  fn list_shows_titles_and_summary() {
    let mut app = app();
    let screen = render(&mut app);
    assert!(screen.contains("Morning run"));
    assert!(screen.contains("Ramen at home"));
    assert!(screen.contains("2 of 2 videos"));
    assert!(screen.contains("date-desc"));
  }

  #[test]
  fn empty_filter_result_explains_itself() {
    let mut app = app();
    app.criteria.search_term = "zzz".to_string();
    app.recompute_view();
    let screen = render(&mut app);
    assert!(screen.contains("No videos match"));
    assert!(screen.contains("Clear"));
  }

  #[test]
  fn detail_and_delete_prompt_render() {
    let mut app = app();
    app.detail = app.selected_record().cloned();
    app.mode = AppMode::ConfirmDelete;
    let screen = render(&mut app);
    assert!(screen.contains("Video #1"));
    assert!(screen.contains("cannot be undone"));
  }

  #[test]
  fn stats_list_popular_tags() {
    let mut app = app();
    app.mode = AppMode::Stats;
    let screen = render(&mut app);
    assert!(screen.contains("Popular tags"));
    assert!(screen.contains("cooking"));
  }

  #[test]
  fn toast_replaces_summary() {
    let mut app = app();
    app.notify(ToastLevel::Error, "Failed to load videos");
    assert!(render(&mut app).contains("Failed to load videos"));
  }

  #[test]
  fn upload_form_labels_fields() {
    let mut app = app();
    app.mode = AppMode::Upload;
    let screen = render(&mut app);
    assert!(screen.contains("Tags (comma-separated)"));
    assert!(screen.contains("mp4"));
  }

  #[test]
  fn wide_titles_keep_metadata_in_the_row() {
    let record = record(1, "とても長い日本語のタイトルがここに入ります本当に長い", "2024-03-01", &[]);
    let theme = &crate::theme::THEMES[0];
    let row = list_row(theme, &record, theme.fg, 40);
    assert!(row.width() <= 40);
    let text: String = row.spans.iter().map(|s| s.content.as_ref()).collect();
    assert!(text.ends_with("0 Bytes"));
  }

  #[test]
  fn centered_popup_fits_area() {
    let r = centered(Rect::new(0, 0, 20, 10), 50, 4);
    assert_eq!((r.width, r.height), (20, 4));
    assert_eq!(r.y, 3);
  }
}
