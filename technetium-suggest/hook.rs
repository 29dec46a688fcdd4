//! Debounce scheduling and request dispatch.
//!
//! The hook coalesces bursts of edit events into at most one completion
//! request per quiet period. When the deadline elapses it asks the
//! session manager for a new session and spawns the request task that
//! drives the client's fragment stream back into the manager, tagged
//! with the session id and wrapped in the session's cancellation handle.

use std::{
  sync::Arc,
  time::Duration,
};

use futures_util::StreamExt;
use parking_lot::Mutex;
use technetium_event::{
  AsyncHook,
  cancelable_future,
};
use tokio::time::Instant;

use crate::{
  client::{
    CompletionClient,
    CompletionRequest,
  },
  config::SuggestConfig,
  host::EditorHost,
  session::{
    SessionId,
    SessionManager,
    StreamUpdate,
  },
};

/// Events fed to the suggestion hook.
#[derive(Debug, Clone, Copy)]
pub enum SuggestionEvent {
  /// A qualifying buffer mutation occurred.
  Edit,
}

/// Async hook owning the debounce deadline.
pub struct SuggestionHook<H: EditorHost, C: CompletionClient> {
  state:         Arc<Mutex<SessionManager<H>>>,
  client:        Arc<C>,
  quiet:         Duration,
  context_chars: usize,
  max_tokens:    u32,
}

impl<H: EditorHost, C: CompletionClient> SuggestionHook<H, C> {
  pub fn new(state: Arc<Mutex<SessionManager<H>>>, client: Arc<C>, config: &SuggestConfig) -> Self {
    SuggestionHook {
      state,
      client,
      quiet: config.quiet_interval(),
      context_chars: config.context_chars,
      max_tokens: config.max_tokens,
    }
  }
}

impl<H: EditorHost, C: CompletionClient> AsyncHook for SuggestionHook<H, C> {
  type Event = SuggestionEvent;

  fn handle_event(&mut self, event: SuggestionEvent, _deadline: Option<Instant>) -> Option<Instant> {
    match event {
      // Every edit restarts the quiet period; the previous deadline is
      // replaced wholesale.
      SuggestionEvent::Edit => Some(Instant::now() + self.quiet),
    }
  }

  fn finish_debounce(&mut self) {
    let Some(prepared) = self.state.lock().begin(self.context_chars) else {
      return;
    };

    let request = CompletionRequest {
      prompt:     prepared.context,
      max_tokens: self.max_tokens,
      stream:     true,
    };
    let state = Arc::clone(&self.state);
    let client = Arc::clone(&self.client);
    tokio::spawn(cancelable_future(
      drive_request(client, state, prepared.id, request),
      prepared.handle,
    ));
  }
}

/// Forward one request's stream events into the session manager.
///
/// Errors never escape this task: transport and payload failures are
/// converted into a `Failed` update for the session they belong to, and
/// the manager drops anything stale (the id comparison happens there,
/// not here).
async fn drive_request<H: EditorHost, C: CompletionClient>(
  client: Arc<C>,
  state: Arc<Mutex<SessionManager<H>>>,
  id: SessionId,
  request: CompletionRequest,
) {
  let mut fragments = match client.complete(request).await {
    Ok(fragments) => fragments,
    Err(err) => {
      log::debug!("{id}: completion request failed: {err}");
      state.lock().apply(id, StreamUpdate::Failed);
      return;
    },
  };

  while let Some(fragment) = fragments.next().await {
    match fragment {
      Ok(text) => state.lock().apply(id, StreamUpdate::Chunk(text)),
      Err(err) => {
        log::debug!("{id}: completion stream failed: {err}");
        state.lock().apply(id, StreamUpdate::Failed);
        return;
      },
    }
  }

  state.lock().apply(id, StreamUpdate::Finished);
}
