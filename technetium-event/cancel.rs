//! Cancellation of in-flight background tasks.
//!
//! A [`TaskController`] is owned by whoever decides when work becomes
//! stale (for the suggestion engine: the session manager). Each unit of
//! work gets a [`TaskHandle`] from [`TaskController::restart`]; restarting
//! or [`cancel`](TaskController::cancel)ing flags every previously issued
//! handle. Cancellation is cooperative: a task observes it either by
//! polling [`TaskHandle::is_canceled`] or by being wrapped in
//! [`cancelable_future`].

use std::{
  future::Future,
  sync::Arc,
};

use tokio_util::sync::CancellationToken;

/// Cancellation handle carried by a spawned task.
#[derive(Clone)]
pub struct TaskHandle {
  token: CancellationToken,
  // Extra strong count held by the task for as long as it runs; lets the
  // controller tell "still running" apart from "completed".
  alive: Arc<()>,
}

impl TaskHandle {
  pub fn is_canceled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Resolves once the controlling side cancels this handle.
  pub async fn canceled(&self) {
    self.token.cancelled().await
  }
}

/// Issues and revokes [`TaskHandle`]s. Only the most recently issued
/// handle is ever live; `restart` revokes all predecessors.
pub struct TaskController {
  active: Option<TaskHandle>,
}

impl TaskController {
  pub fn new() -> Self {
    TaskController { active: None }
  }

  /// Cancel the current task (if any) and issue a fresh handle for the
  /// next one.
  pub fn restart(&mut self) -> TaskHandle {
    self.cancel();
    let handle = TaskHandle {
      token: CancellationToken::new(),
      alive: Arc::new(()),
    };
    self.active = Some(handle.clone());
    handle
  }

  pub fn cancel(&mut self) {
    if let Some(handle) = self.active.take() {
      handle.token.cancel();
    }
  }

  /// Whether a non-canceled task still holds its handle.
  pub fn is_running(&self) -> bool {
    self
      .active
      .as_ref()
      .is_some_and(|handle| !handle.token.is_cancelled() && Arc::strong_count(&handle.alive) > 1)
  }
}

impl Default for TaskController {
  fn default() -> Self {
    Self::new()
  }
}

/// Run `fut` to completion unless `handle` is canceled first. Returns
/// `None` on cancellation.
pub async fn cancelable_future<F: Future>(fut: F, handle: TaskHandle) -> Option<F::Output> {
  tokio::select! {
    biased;
    _ = handle.canceled() => None,
    output = fut => Some(output),
  }
}
