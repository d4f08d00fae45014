mod api;
mod app;
mod catalog;
mod commands;
mod config;
mod constants;
mod debounce;
mod format;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use api::ApiClient;
use app::App;
use commands::{ListArgs, TagsArgs};
use config::{API_URL_ENV, Config};
use constants::constants;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Backend base URL (overrides REEL_API_URL and saved prefs)
  #[arg(long, global = true)]
  api_url: Option<String>,
  /// Directory for reel.log (default: platform data dir)
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,
  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the filtered, sorted catalog
  List(ListArgs),
  /// Print the most used tags
  Tags(TagsArgs),
  /// Generate shell completions
  Completions {
    shell: clap_complete::Shell,
  },
}

// --- Logging ---

/// Route tracing output to `reel.log`; the TUI owns stdout.
fn init_logging(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {}", dir.display()))?;
  let appender = RollingFileAppender::builder()
    .rotation(Rotation::NEVER)
    .filename_prefix("reel")
    .filename_suffix("log")
    .build(dir)
    .context("Failed to open log file")?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info")))
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .context("Failed to install log subscriber")?;
  Ok(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(Command::Completions { shell }) = &args.command {
    clap_complete::generate(*shell, &mut Args::command(), "reel", &mut std::io::stdout());
    return Ok(());
  }

  let log_dir = args.log_dir.clone().unwrap_or_else(config::default_log_dir);
  let _guard = init_logging(&log_dir)?;

  let config = Config::load();
  let env_url = std::env::var(API_URL_ENV).ok();
  let api_url = config.resolve_api_url(args.api_url.as_deref(), env_url.as_deref());
  let api = ApiClient::new(&api_url)?;
  info!(url = %api.base_url(), version = env!("CARGO_PKG_VERSION"), "starting");

  match &args.command {
    Some(Command::List(list)) => return commands::list(&api, list).await,
    Some(Command::Tags(tags)) => return commands::tags(&api, tags).await,
    Some(Command::Completions { .. }) | None => {}
  }

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, App::new(api, config));
  ratatui::restore();
  if let Err(e) = &result {
    tracing::error!("exiting with error: {:#}", e);
  }
  result
}

fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
  app.refresh();

  loop {
    app.check_pending();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(constants().poll_interval())? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  info!("quit");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn global_flags_follow_subcommands() {
    let args = Args::try_parse_from(["reel", "tags", "--limit", "3", "--api-url", "http://x"]).unwrap();
    assert_eq!(args.api_url.as_deref(), Some("http://x"));
    assert!(matches!(args.command, Some(Command::Tags(TagsArgs { limit: Some(3), all: false }))));
  }

  #[test]
  fn no_subcommand_starts_tui() {
    let args = Args::try_parse_from(["reel"]).unwrap();
    assert!(args.command.is_none());
  }
}
