use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Single-line editable text with a char-indexed cursor.
#[derive(Debug, Clone, Default)]
pub struct TextField {
  value: String,
  cursor: usize,
  /// Horizontal scroll offset in display columns, maintained by the renderer.
  pub scroll: usize,
}

impl TextField {
  pub fn value(&self) -> &str {
    &self.value
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn is_empty(&self) -> bool {
    self.value.is_empty()
  }

  pub fn set(&mut self, value: &str) {
    self.value = value.to_string();
    self.cursor = self.value.chars().count();
  }

  pub fn clear(&mut self) {
    self.value.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  /// Apply an editing key. Returns `true` when the text changed.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    let len = self.value.chars().count();
    match key.code {
      KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_idx, c);
        self.cursor += 1;
        true
      }
      KeyCode::Backspace if self.cursor > 0 => {
        self.cursor -= 1;
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_idx);
        true
      }
      KeyCode::Delete if self.cursor < len => {
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_idx);
        true
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        false
      }
      KeyCode::Right => {
        self.cursor = (self.cursor + 1).min(len);
        false
      }
      KeyCode::Home => {
        self.cursor = 0;
        false
      }
      KeyCode::End => {
        self.cursor = len;
        false
      }
      _ => false,
    }
  }
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key),
    AppMode::Search => handle_search_key(app, key),
    AppMode::Detail => handle_detail_key(app, key),
    AppMode::ConfirmDelete => handle_confirm_delete_key(app, key),
    AppMode::Publish => handle_publish_key(app, key),
    AppMode::Upload => handle_upload_key(app, key),
    AppMode::Stats => handle_stats_key(app, key),
  }
}

fn handle_browse_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
    KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
    KeyCode::Enter => app.open_detail(),
    KeyCode::Char('/') => {
      app.clear_toast();
      app.mode = AppMode::Search;
    }
    KeyCode::Char('t') => app.cycle_tag(true),
    KeyCode::Char('T') => app.cycle_tag(false),
    KeyCode::Char('s') => app.cycle_sort_field(),
    KeyCode::Char('o') => app.toggle_sort_order(),
    KeyCode::Char('c') => app.clear_filters(),
    KeyCode::Char('r') => app.refresh(),
    KeyCode::Char('u') => app.open_upload(),
    KeyCode::Char('a') => app.open_stats(),
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Esc => {
      if app.criteria.is_unfiltered() {
        app.should_quit = true;
      } else {
        app.clear_filters();
      }
    }
    _ => {}
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.apply_search_now();
      app.mode = AppMode::Browse;
    }
    KeyCode::Esc => {
      app.search.clear();
      app.apply_search_now();
      app.mode = AppMode::Browse;
    }
    KeyCode::Down => app.move_selection(true),
    KeyCode::Up => app.move_selection(false),
    _ => {
      if app.search.handle_key(key) {
        app.on_search_edited();
      }
    }
  }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char('p') => app.open_publish(),
    KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
    KeyCode::Esc | KeyCode::Char('q') => app.close_detail(),
    _ => {}
  }
}

fn handle_confirm_delete_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.mode = AppMode::Detail,
    _ => {}
  }
}

fn handle_publish_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => app.publish.move_cursor(true),
    KeyCode::Up | KeyCode::Char('k') => app.publish.move_cursor(false),
    KeyCode::Char(' ') => app.publish.toggle(),
    KeyCode::Enter => app.publish(),
    KeyCode::Esc => app.mode = AppMode::Detail,
    _ => {}
  }
}

fn handle_upload_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Tab | KeyCode::Down => app.upload.focus_next(),
    KeyCode::BackTab | KeyCode::Up => app.upload.focus_prev(),
    KeyCode::Enter => app.submit_upload(),
    KeyCode::Esc => app.mode = AppMode::Browse,
    _ => {
      app.upload.focused_mut().handle_key(key);
    }
  }
}

fn handle_stats_key(app: &mut App, key: KeyEvent) {
  if matches!(key.code, KeyCode::Esc | KeyCode::Char('a') | KeyCode::Char('q')) {
    app.mode = AppMode::Browse;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::catalog::tests::record;
  use crate::config::Config;

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(field: &mut TextField, s: &str) {
    for c in s.chars() {
      field.handle_key(press(KeyCode::Char(c)));
    }
  }

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6);
  }

  // --- TextField ---

  #[test]
  fn text_field_edits_multibyte_text() {
    let mut f = TextField::default();
    type_str(&mut f, "café日");
    assert_eq!(f.cursor(), 5);
    f.handle_key(press(KeyCode::Left));
    f.handle_key(press(KeyCode::Backspace));
    assert_eq!(f.value(), "caf日");
    f.handle_key(press(KeyCode::Home));
    f.handle_key(press(KeyCode::Delete));
    assert_eq!(f.value(), "af日");
    f.handle_key(press(KeyCode::End));
    assert!(f.handle_key(press(KeyCode::Char('!'))));
    assert_eq!(f.value(), "af日!");
  }

  #[test]
  fn text_field_ignores_control_chords_and_noop_edits() {
    let mut f = TextField::default();
    assert!(!f.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)));
    assert!(!f.handle_key(press(KeyCode::Backspace)));
    assert!(!f.handle_key(press(KeyCode::Delete)));
    assert!(f.is_empty());
    assert!(f.handle_key(KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)));
    assert_eq!(f.value(), "A");
  }

  #[test]
  fn text_field_cursor_stays_in_bounds() {
    let mut f = TextField::default();
    f.set("ab");
    f.handle_key(press(KeyCode::Right));
    assert_eq!(f.cursor(), 2);
    f.clear();
    f.handle_key(press(KeyCode::Left));
    assert_eq!(f.cursor(), 0);
  }

  // --- key routing ---

  fn app() -> App {
    let mut app = App::new(ApiClient::new("http://127.0.0.1:9").unwrap(), Config::default());
    app.persist_config = false;
    app.set_records(vec![record(1, "Alpha", "2022-01-01", &["x"]), record(2, "Beta", "2023-01-01", &["y"])]);
    app
  }

  #[tokio::test]
  async fn slash_enters_search_and_enter_applies_immediately() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Char('/')));
    assert_eq!(app.mode, AppMode::Search);
    handle_key_event(&mut app, press(KeyCode::Char('a')));
    handle_key_event(&mut app, press(KeyCode::Char('l')));
    handle_key_event(&mut app, press(KeyCode::Enter));
    assert_eq!(app.mode, AppMode::Browse);
    assert_eq!(app.criteria.search_term, "al");
    assert_eq!(app.view.len(), 1);
  }

  #[test]
  fn escape_in_search_clears_term() {
    let mut app = app();
    app.search.set("beta");
    app.apply_search_now();
    app.mode = AppMode::Search;
    handle_key_event(&mut app, press(KeyCode::Esc));
    assert!(app.criteria.search_term.is_empty());
    assert_eq!(app.view.len(), 2);
  }

  #[test]
  fn escape_in_browse_clears_filters_before_quitting() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Char('t')));
    assert!(app.criteria.selected_tag.is_some());
    handle_key_event(&mut app, press(KeyCode::Esc));
    assert!(!app.should_quit);
    assert!(app.criteria.selected_tag.is_none());
    handle_key_event(&mut app, press(KeyCode::Esc));
    assert!(app.should_quit);
  }

  #[test]
  fn ctrl_c_quits_from_any_mode() {
    let mut app = app();
    app.mode = AppMode::Upload;
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }

  #[test]
  fn upload_keys_edit_the_focused_field() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Char('u')));
    assert_eq!(app.mode, AppMode::Upload);
    handle_key_event(&mut app, press(KeyCode::Char('v')));
    handle_key_event(&mut app, press(KeyCode::Tab));
    handle_key_event(&mut app, press(KeyCode::Char('T')));
    assert_eq!(app.upload.path.value(), "v");
    assert_eq!(app.upload.title.value(), "T");
  }

  #[test]
  fn delete_needs_confirmation() {
    let mut app = app();
    app.detail = app.selected_record().cloned();
    app.mode = AppMode::Detail;
    handle_key_event(&mut app, press(KeyCode::Char('d')));
    assert_eq!(app.mode, AppMode::ConfirmDelete);
    handle_key_event(&mut app, press(KeyCode::Char('n')));
    assert_eq!(app.mode, AppMode::Detail);
    assert!(app.tasks.delete.is_none());
  }
}
