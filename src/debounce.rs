//! Cancellable quiescence timer for search-as-you-type.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fires at most once per quiescence window.
///
/// Each [`schedule`](Debouncer::schedule) aborts the pending timer and starts
/// a new one. Timers report their generation, so a timer that elapsed just
/// before being replaced is ignored.
pub struct Debouncer {
  window: Duration,
  generation: u64,
  handle: Option<JoinHandle<()>>,
  tx: mpsc::UnboundedSender<u64>,
  rx: mpsc::UnboundedReceiver<u64>,
}

impl Debouncer {
  pub fn new(window: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { window, generation: 0, handle: None, tx, rx }
  }

  /// (Re)start the timer. Must be called from within a tokio runtime.
  pub fn schedule(&mut self) {
    self.cancel();
    let generation = self.generation;
    let window = self.window;
    let tx = self.tx.clone();
    self.handle = Some(tokio::spawn(async move {
      tokio::time::sleep(window).await;
      let _ = tx.send(generation);
    }));
  }

  /// Drop the pending timer, if any.
  pub fn cancel(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
    self.generation = self.generation.wrapping_add(1);
  }

  pub fn is_pending(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  /// Returns `true` once when the current timer has elapsed.
  pub fn fired(&mut self) -> bool {
    let mut fired = false;
    while let Ok(generation) = self.rx.try_recv() {
      if generation == self.generation && self.handle.is_some() {
        fired = true;
      }
    }
    if fired {
      self.handle = None;
    }
    fired
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const WINDOW: Duration = Duration::from_millis(300);

  #[tokio::test(start_paused = true)]
  async fn fires_once_after_quiescence() {
    let mut d = Debouncer::new(WINDOW);
    d.schedule();
    assert!(!d.fired());
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(d.fired());
    assert!(!d.fired());
  }

  #[tokio::test(start_paused = true)]
  async fn rapid_reschedules_collapse_to_one_fire() {
    let mut d = Debouncer::new(WINDOW);
    for _ in 0..5 {
      d.schedule();
      tokio::time::sleep(Duration::from_millis(100)).await;
      assert!(!d.fired());
    }
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(d.fired());
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(!d.fired());
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_suppresses_fire() {
    let mut d = Debouncer::new(WINDOW);
    d.schedule();
    d.cancel();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!d.fired());
    assert!(!d.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn elapsed_timer_from_previous_generation_is_ignored() {
    let mut d = Debouncer::new(WINDOW);
    d.schedule();
    tokio::time::sleep(Duration::from_millis(350)).await;
    // Old timer has sent; rescheduling before polling must discard it.
    d.schedule();
    assert!(!d.fired());
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(d.fired());
  }
}
