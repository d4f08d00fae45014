use anyhow::{Result, anyhow};
use ratatui::widgets::ListState;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, PublishOutcome, UploadProgress, UploadRequest};
use crate::catalog::{
  self, CatalogStats, FilterCriteria, SortField, SortKey, TagCount, VideoRecord, apply_indices, derive_tag_universe,
};
use crate::config::Config;
use crate::constants::constants;
use crate::debounce::Debouncer;
use crate::input::TextField;
use crate::theme::{THEMES, Theme, theme_index};

// --- Background requests ---

/// A spawned request whose result is collected by polling.
///
/// Dropping a `Pending` aborts the task, so replacing one in its slot cancels
/// the earlier request and its late result can never be applied.
pub(crate) struct Pending<T> {
  rx: oneshot::Receiver<Result<T>>,
  handle: JoinHandle<()>,
}

impl<T: Send + 'static> Pending<T> {
  pub(crate) fn spawn<F>(fut: F) -> Self
  where
    F: Future<Output = Result<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let _ = tx.send(fut.await);
    });
    Self { rx, handle }
  }

  /// `Some` once the task has finished (or died).
  pub(crate) fn poll(&mut self) -> Option<Result<T>> {
    match self.rx.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(Err(anyhow!("Background task failed."))),
    }
  }
}

impl<T> Drop for Pending<T> {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// Take the result out of `slot` if its request has completed.
fn take_ready<T: Send + 'static>(slot: &mut Option<Pending<T>>) -> Option<Result<T>> {
  let result = slot.as_mut()?.poll()?;
  *slot = None;
  Some(result)
}

/// In-flight requests, at most one of each kind.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) list: Option<Pending<Vec<VideoRecord>>>,
  pub(crate) detail: Option<Pending<VideoRecord>>,
  pub(crate) delete: Option<Pending<u64>>,
  pub(crate) publish: Option<Pending<Vec<PublishOutcome>>>,
  pub(crate) upload: Option<Pending<VideoRecord>>,
  pub(crate) upload_progress: Option<mpsc::UnboundedReceiver<UploadProgress>>,
}

// --- Modes and sub-state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Browse,
  Search,
  Detail,
  ConfirmDelete,
  Publish,
  Upload,
  Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
  Info,
  Success,
  Warning,
  Error,
}

/// Transient status-line notification.
#[derive(Debug, Clone)]
pub struct Toast {
  pub level: ToastLevel,
  pub message: String,
  shown_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFocus {
  Path,
  Title,
  Description,
  Tags,
}

impl UploadFocus {
  pub const ALL: [UploadFocus; 4] = [UploadFocus::Path, UploadFocus::Title, UploadFocus::Description, UploadFocus::Tags];

  pub fn label(self) -> &'static str {
    match self {
      UploadFocus::Path => "File",
      UploadFocus::Title => "Title",
      UploadFocus::Description => "Description",
      UploadFocus::Tags => "Tags (comma-separated)",
    }
  }

  fn step(self, forward: bool) -> Self {
    let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
    let len = Self::ALL.len();
    Self::ALL[if forward { (idx + 1) % len } else { (idx + len - 1) % len }]
  }
}

#[derive(Debug, Clone)]
pub struct UploadForm {
  pub path: TextField,
  pub title: TextField,
  pub description: TextField,
  pub tags: TextField,
  pub focus: UploadFocus,
}

impl Default for UploadForm {
  fn default() -> Self {
    Self {
      path: TextField::default(),
      title: TextField::default(),
      description: TextField::default(),
      tags: TextField::default(),
      focus: UploadFocus::Path,
    }
  }
}

impl UploadForm {
  pub fn field(&self, focus: UploadFocus) -> &TextField {
    match focus {
      UploadFocus::Path => &self.path,
      UploadFocus::Title => &self.title,
      UploadFocus::Description => &self.description,
      UploadFocus::Tags => &self.tags,
    }
  }

  pub fn field_mut(&mut self, focus: UploadFocus) -> &mut TextField {
    match focus {
      UploadFocus::Path => &mut self.path,
      UploadFocus::Title => &mut self.title,
      UploadFocus::Description => &mut self.description,
      UploadFocus::Tags => &mut self.tags,
    }
  }

  pub fn focused_mut(&mut self) -> &mut TextField {
    self.field_mut(self.focus)
  }

  pub fn focus_next(&mut self) {
    self.focus = self.focus.step(true);
  }

  pub fn focus_prev(&mut self) {
    self.focus = self.focus.step(false);
  }

  pub fn to_request(&self) -> UploadRequest {
    UploadRequest {
      path: expand_home(self.path.value().trim()).into(),
      title: self.title.value().to_string(),
      description: self.description.value().to_string(),
      tags: self.tags.value().to_string(),
    }
  }
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &str) -> String {
  match (path.strip_prefix("~/"), std::env::var("HOME")) {
    (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
    _ => path.to_string(),
  }
}

/// Checklist state for the publish dialog.
#[derive(Debug, Clone)]
pub struct PublishSelection {
  pub cursor: usize,
  pub chosen: Vec<bool>,
}

impl Default for PublishSelection {
  fn default() -> Self {
    Self { cursor: 0, chosen: vec![false; constants().platforms.len()] }
  }
}

impl PublishSelection {
  pub fn toggle(&mut self) {
    if let Some(c) = self.chosen.get_mut(self.cursor) {
      *c = !*c;
    }
  }

  pub fn move_cursor(&mut self, down: bool) {
    let len = self.chosen.len();
    if len > 0 {
      self.cursor = if down { (self.cursor + 1) % len } else { (self.cursor + len - 1) % len };
    }
  }

  /// Wire names of the checked platforms, in display order.
  pub fn platform_names(&self) -> Vec<String> {
    constants()
      .platforms
      .iter()
      .zip(&self.chosen)
      .filter(|(_, chosen)| **chosen)
      .map(|(p, _)| p.name.clone())
      .collect()
  }
}

/// Toast for a finished publish request, graded by how many platforms accepted it.
fn publish_summary(outcomes: &[PublishOutcome]) -> (ToastLevel, String) {
  if outcomes.is_empty() {
    return (ToastLevel::Warning, "Server reported no publish results.".to_string());
  }
  match outcomes.iter().filter(|o| o.success).count() {
    0 => (ToastLevel::Error, "Publishing failed on every platform.".to_string()),
    n if n == outcomes.len() => (ToastLevel::Success, "Publication started.".to_string()),
    n => (ToastLevel::Warning, format!("Published to {} of {} platforms.", n, outcomes.len())),
  }
}

// --- App ---

pub struct App {
  pub api: ApiClient,
  pub mode: AppMode,
  pub theme_index: usize,
  /// Latest record list from the backend. Replaced wholesale, never edited.
  pub records: Arc<[VideoRecord]>,
  pub criteria: FilterCriteria,
  /// Indices into `records` in display order.
  pub view: Vec<usize>,
  pub tag_universe: Vec<String>,
  pub list_state: ListState,
  pub search: TextField,
  pub detail: Option<VideoRecord>,
  pub publish: PublishSelection,
  pub publish_results: Vec<PublishOutcome>,
  pub upload: UploadForm,
  pub upload_progress: Option<UploadProgress>,
  pub toast: Option<Toast>,
  /// Whether the first list response has arrived.
  pub loaded: bool,
  pub should_quit: bool,
  config: Config,
  /// Write preference changes back to `prefs.toml`.
  pub(crate) persist_config: bool,
  search_debounce: Debouncer,
  pub(crate) tasks: AsyncTasks,
}

impl App {
  pub fn new(api: ApiClient, config: Config) -> Self {
    let theme_index = theme_index(config.theme_name.as_deref());
    let criteria = FilterCriteria { sort: config.sort.unwrap_or_default(), ..Default::default() };

    Self {
      api,
      mode: AppMode::Browse,
      theme_index,
      records: Arc::from(Vec::new()),
      criteria,
      view: Vec::new(),
      tag_universe: Vec::new(),
      list_state: ListState::default(),
      search: TextField::default(),
      detail: None,
      publish: PublishSelection::default(),
      publish_results: Vec::new(),
      upload: UploadForm::default(),
      upload_progress: None,
      toast: None,
      loaded: false,
      should_quit: false,
      config,
      persist_config: true,
      search_debounce: Debouncer::new(constants().search_debounce()),
      tasks: AsyncTasks::default(),
    }
  }

  pub fn theme(&self) -> &'static Theme {
    // Safety: theme_index comes from theme_index() or modular arithmetic in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&mut self) {
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.sort = Some(self.criteria.sort);
    if self.persist_config {
      self.config.save();
    }
  }

  // --- Notifications ---

  pub fn notify(&mut self, level: ToastLevel, message: impl Into<String>) {
    let message = message.into();
    match level {
      ToastLevel::Error => error!(msg = %message, "toast"),
      ToastLevel::Warning => warn!(msg = %message, "toast"),
      _ => debug!(msg = %message, "toast"),
    }
    self.toast = Some(Toast { level, message, shown_at: Instant::now() });
  }

  pub fn clear_toast(&mut self) {
    self.toast = None;
  }

  /// Drop the toast once it has been visible for its full lifetime.
  pub fn expire_toast(&mut self) {
    if self.toast.as_ref().is_some_and(|t| t.shown_at.elapsed() >= constants().toast_lifetime()) {
      self.toast = None;
    }
  }

  /// What the status line should say about in-flight work, if anything.
  pub fn busy_label(&self) -> Option<String> {
    if self.tasks.upload.is_some() {
      let pct = self.upload_progress.map_or(0.0, |p| p.ratio() * 100.0);
      return Some(format!("Uploading… {:.0}%", pct));
    }
    if self.tasks.delete.is_some() {
      return Some("Deleting…".to_string());
    }
    if self.tasks.publish.is_some() {
      return Some("Publishing…".to_string());
    }
    if self.tasks.detail.is_some() {
      return Some("Loading video…".to_string());
    }
    if self.tasks.list.is_some() {
      return Some("Loading videos…".to_string());
    }
    None
  }

  // --- View ---

  pub fn selected_record(&self) -> Option<&VideoRecord> {
    let pos = self.list_state.selected()?;
    self.view.get(pos).and_then(|&i| self.records.get(i))
  }

  /// Replace the snapshot with a fresh list from the backend.
  pub fn set_records(&mut self, records: Vec<VideoRecord>) {
    let selected_id = self.selected_record().map(|r| r.id);
    self.records = Arc::from(records);
    self.tag_universe = derive_tag_universe(&self.records);
    if let Some(tag) = &self.criteria.selected_tag
      && !self.tag_universe.contains(tag)
    {
      debug!(tag = %tag, "tag filter no longer present, clearing");
      self.criteria.selected_tag = None;
    }
    self.rebuild_view(selected_id);
  }

  /// Re-derive `view` from the snapshot and criteria, keeping the selection
  /// on the same record when it is still visible.
  pub fn recompute_view(&mut self) {
    let selected_id = self.selected_record().map(|r| r.id);
    self.rebuild_view(selected_id);
  }

  /// `selected_id` must be read against the view that was on screen, before
  /// any snapshot swap.
  fn rebuild_view(&mut self, selected_id: Option<u64>) {
    self.view = apply_indices(&self.records, &self.criteria);

    if self.view.is_empty() {
      self.list_state.select(None);
      return;
    }
    let same = selected_id.and_then(|id| self.view.iter().position(|&i| self.records[i].id == id));
    let pos = match (same, self.list_state.selected()) {
      (Some(pos), _) => pos,
      (None, Some(sel)) => sel.min(self.view.len() - 1),
      (None, None) => 0,
    };
    self.list_state.select(Some(pos));
  }

  pub fn move_selection(&mut self, down: bool) {
    let count = self.view.len();
    if count == 0 {
      return;
    }
    let i = match self.list_state.selected() {
      None => 0,
      Some(i) if down => (i + 1) % count,
      Some(0) => count - 1,
      Some(i) => i - 1,
    };
    self.list_state.select(Some(i));
  }

  pub fn stats(&self) -> CatalogStats {
    CatalogStats::from_records(&self.records)
  }

  pub fn popular_tags(&self) -> Vec<TagCount> {
    catalog::derive_tag_frequency(&self.records, constants().popular_tag_limit)
  }

  // --- Criteria ---

  /// Search text changed: apply it once typing pauses.
  pub fn on_search_edited(&mut self) {
    self.search_debounce.schedule();
  }

  pub fn apply_search_now(&mut self) {
    self.search_debounce.cancel();
    if self.criteria.search_term != self.search.value() {
      self.criteria.search_term = self.search.value().to_string();
      debug!(term = %self.criteria.search_term, "search applied");
      self.recompute_view();
    }
  }

  pub fn clear_filters(&mut self) {
    self.search.clear();
    self.search_debounce.cancel();
    self.criteria.search_term.clear();
    self.criteria.selected_tag = None;
    self.recompute_view();
  }

  /// Step the tag filter through "all tags" followed by the tag universe.
  pub fn cycle_tag(&mut self, forward: bool) {
    let len = self.tag_universe.len() + 1;
    let pos = match &self.criteria.selected_tag {
      None => 0,
      Some(tag) => self.tag_universe.iter().position(|t| t == tag).map_or(0, |i| i + 1),
    };
    let next = if forward { (pos + 1) % len } else { (pos + len - 1) % len };
    self.criteria.selected_tag = if next == 0 { None } else { Some(self.tag_universe[next - 1].clone()) };
    self.recompute_view();
  }

  pub fn cycle_sort_field(&mut self) {
    let idx = SortField::ALL.iter().position(|f| *f == self.criteria.sort.field).unwrap_or(0);
    let field = SortField::ALL[(idx + 1) % SortField::ALL.len()];
    self.set_sort(SortKey::new(field, self.criteria.sort.order));
  }

  pub fn toggle_sort_order(&mut self) {
    self.set_sort(SortKey::new(self.criteria.sort.field, self.criteria.sort.order.toggled()));
  }

  fn set_sort(&mut self, sort: SortKey) {
    self.criteria.sort = sort;
    info!(sort = %sort, "sort changed");
    self.recompute_view();
    self.save_config();
  }

  // --- Requests ---

  /// Fetch the record list. A refresh already in flight is cancelled.
  pub fn refresh(&mut self) {
    info!(url = %self.api.base_url(), "refresh triggered");
    let api = self.api.clone();
    self.tasks.list = Some(Pending::spawn(async move { api.list_videos().await }));
  }

  pub fn open_detail(&mut self) {
    let Some(id) = self.selected_record().map(|r| r.id) else { return };
    self.clear_toast();
    let api = self.api.clone();
    self.tasks.detail = Some(Pending::spawn(async move { api.get_video(id).await }));
  }

  pub fn close_detail(&mut self) {
    self.detail = None;
    self.publish_results.clear();
    self.mode = AppMode::Browse;
  }

  pub fn request_delete(&mut self) {
    if self.detail.is_some() && self.tasks.delete.is_none() {
      self.mode = AppMode::ConfirmDelete;
    }
  }

  pub fn confirm_delete(&mut self) {
    self.mode = AppMode::Detail;
    let Some(id) = self.detail.as_ref().map(|d| d.id) else { return };
    let api = self.api.clone();
    self.tasks.delete = Some(Pending::spawn(async move { api.delete_video(id).await.map(|()| id) }));
  }

  pub fn open_publish(&mut self) {
    if self.detail.is_some() {
      self.publish = PublishSelection::default();
      self.mode = AppMode::Publish;
    }
  }

  pub fn publish(&mut self) {
    let platforms = self.publish.platform_names();
    if platforms.is_empty() {
      self.notify(ToastLevel::Warning, "Select at least one platform.");
      return;
    }
    let Some(id) = self.detail.as_ref().map(|d| d.id) else { return };
    self.publish_results.clear();
    self.mode = AppMode::Detail;
    let api = self.api.clone();
    self.tasks.publish = Some(Pending::spawn(async move { api.publish_video(id, &platforms).await }));
  }

  pub fn open_upload(&mut self) {
    self.mode = AppMode::Upload;
  }

  pub fn submit_upload(&mut self) {
    if self.tasks.upload.is_some() {
      self.notify(ToastLevel::Warning, "An upload is already in progress.");
      return;
    }
    let request = self.upload.to_request();
    if let Err(e) = request.validate() {
      self.notify(ToastLevel::Warning, e.to_string());
      return;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let api = self.api.clone();
    self.upload_progress = None;
    self.tasks.upload_progress = Some(rx);
    self.tasks.upload = Some(Pending::spawn(async move { api.upload_video(request, tx).await }));
  }

  pub fn open_stats(&mut self) {
    self.mode = AppMode::Stats;
  }

  // --- Polling ---

  /// Collect finished requests and timers. Called once per loop iteration.
  pub fn check_pending(&mut self) {
    if self.search_debounce.fired() {
      self.apply_search_now();
    }

    if let Some(result) = take_ready(&mut self.tasks.list) {
      match result {
        Ok(records) => {
          self.loaded = true;
          self.set_records(records);
        }
        Err(e) => self.notify(ToastLevel::Error, format!("Failed to load videos: {:#}", e)),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.detail) {
      match result {
        Ok(record) if matches!(self.mode, AppMode::Browse | AppMode::Search) => {
          self.detail = Some(record);
          self.publish_results.clear();
          self.mode = AppMode::Detail;
        }
        Ok(record) => debug!(id = record.id, "detail arrived after leaving the list, ignoring"),
        Err(e) => self.notify(ToastLevel::Error, format!("Failed to load video: {:#}", e)),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.delete) {
      match result {
        Ok(id) => {
          if self.detail.as_ref().is_some_and(|d| d.id == id) {
            self.close_detail();
          }
          self.notify(ToastLevel::Success, "Video deleted.");
          self.refresh();
        }
        Err(e) => self.notify(ToastLevel::Error, format!("Delete failed: {:#}", e)),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.publish) {
      match result {
        Ok(outcomes) => {
          let ok = outcomes.iter().filter(|o| o.success).count();
          info!(ok, total = outcomes.len(), "publish finished");
          let (level, message) = publish_summary(&outcomes);
          self.publish_results = outcomes;
          self.notify(level, message);
        }
        Err(e) => self.notify(ToastLevel::Error, format!("Publish failed: {:#}", e)),
      }
    }

    if let Some(rx) = &mut self.tasks.upload_progress {
      while let Ok(progress) = rx.try_recv() {
        self.upload_progress = Some(progress);
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.upload) {
      self.tasks.upload_progress = None;
      self.upload_progress = None;
      match result {
        Ok(created) => {
          info!(id = created.id, "upload complete");
          self.upload = UploadForm::default();
          self.notify(ToastLevel::Success, format!("Uploaded '{}'.", created.title));
          if self.mode == AppMode::Upload {
            self.mode = AppMode::Browse;
          }
          self.refresh();
        }
        Err(e) => self.notify(ToastLevel::Error, format!("Upload failed: {:#}", e)),
      }
    }

    self.expire_toast();
  }
}
