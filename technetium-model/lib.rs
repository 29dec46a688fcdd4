//! Local model runner lifecycle.
//!
//! The shell starts the model service as a child process, polls its
//! health endpoint, and stops it on demand. All plumbing: the interesting
//! failure handling lives with the suggestion engine, which tolerates an
//! absent or unhealthy runner by design.

use std::{
  path::Path,
  process::Stdio,
  time::Duration,
};

use anyhow::{
  Context,
  Result,
};
use serde::Deserialize;
use tokio::process::{
  Child,
  Command,
};

/// Default endpoint the runner serves on.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
  Started { pid: Option<u32> },
  /// A child started by this runner is still alive; not an error.
  AlreadyRunning,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
  Stopped,
  /// Nothing to stop; not an error.
  NotRunning,
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
  #[serde(default)]
  ok: bool,
}

/// Owns at most one runner child process.
pub struct ModelRunner {
  endpoint: String,
  http:     reqwest::Client,
  child:    Option<Child>,
}

impl ModelRunner {
  pub fn new(endpoint: impl Into<String>) -> Self {
    let endpoint = endpoint.into();
    ModelRunner {
      endpoint: endpoint.trim_end_matches('/').to_string(),
      http:     reqwest::Client::new(),
      child:    None,
    }
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  /// Spawn the runner executable with its stdio detached.
  pub fn start(&mut self, program: impl AsRef<Path>, args: &[&str]) -> Result<StartOutcome> {
    if self.is_running() {
      return Ok(StartOutcome::AlreadyRunning);
    }

    let program = program.as_ref();
    let child = Command::new(program)
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .with_context(|| format!("failed to spawn model runner {}", program.display()))?;
    let pid = child.id();
    log::info!("model runner started (pid {pid:?})");
    self.child = Some(child);
    Ok(StartOutcome::Started { pid })
  }

  /// Whether the child this runner started is still alive. Reaps a child
  /// that exited on its own.
  pub fn is_running(&mut self) -> bool {
    let Some(child) = self.child.as_mut() else {
      return false;
    };
    match child.try_wait() {
      Ok(Some(status)) => {
        log::info!("model runner exited on its own ({status})");
        self.child = None;
        false
      },
      Ok(None) => true,
      Err(err) => {
        log::warn!("failed to poll model runner: {err}");
        false
      },
    }
  }

  /// Probe the runner's health endpoint. Any transport problem, bad
  /// status, or malformed payload reads as unhealthy.
  pub async fn is_healthy(&self) -> bool {
    let url = format!("{}/health", self.endpoint);
    let response = match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
      Ok(response) => response,
      Err(err) => {
        log::debug!("health probe failed: {err}");
        return false;
      },
    };
    if !response.status().is_success() {
      return false;
    }
    match response.json::<HealthPayload>().await {
      Ok(payload) => payload.ok,
      Err(err) => {
        log::debug!("health payload malformed: {err}");
        false
      },
    }
  }

  /// Stop the child process, reaping it before returning.
  pub async fn stop(&mut self) -> Result<StopOutcome> {
    let Some(mut child) = self.child.take() else {
      return Ok(StopOutcome::NotRunning);
    };

    if child
      .try_wait()
      .context("failed to poll model runner")?
      .is_some()
    {
      // Exited on its own before we got to it.
      return Ok(StopOutcome::NotRunning);
    }

    child.start_kill().context("failed to signal model runner")?;
    child.wait().await.context("failed to reap model runner")?;
    log::info!("model runner stopped");
    Ok(StopOutcome::Stopped)
  }
}

impl Drop for ModelRunner {
  fn drop(&mut self) {
    if let Some(child) = self.child.as_mut() {
      // Detached on purpose: the runner may outlive the shell, matching
      // the detached spawn. Log so an orphan is at least visible.
      log::debug!("model runner left running (pid {:?})", child.id());
    }
  }
}
