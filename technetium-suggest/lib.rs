//! Inline ghost-text suggestions for the technetium editor shell.
//!
//! The engine watches live edits, debounces them into completion requests
//! against a local model service, streams partial tokens back, renders
//! them as provisional ghost text anchored at the cursor, and resolves
//! user intent: accept, dismiss, or superseded by a newer edit. Several
//! request lifecycles can be in flight or stale at once; every stream
//! event is correlated by session id at a single choke point
//! ([`session::SessionManager::apply`]), so late events for superseded
//! sessions are inert.
//!
//! The embedding shell supplies an [`EditorHost`] and routes three things
//! into the engine: edit notifications ([`SuggestEngine::on_edit`]), key
//! presses ([`SuggestEngine::handle_key`]), and its tokio runtime (the
//! engine spawns its debounce hook and request tasks on the ambient
//! runtime). Everything else is internal.

pub mod client;
pub mod config;
pub mod context;
pub mod host;
pub mod hook;
pub mod keymap;
pub mod render;
pub mod session;

use std::sync::Arc;

use parking_lot::Mutex;
use technetium_event::{
  AsyncHook,
  send_blocking,
};
use tokio::sync::mpsc::Sender;

pub use crate::{
  client::{
    ClientError,
    CompletionClient,
    CompletionRequest,
    FragmentStream,
    LocalModelClient,
  },
  config::SuggestConfig,
  host::{
    EditorHost,
    Position,
  },
  keymap::{
    KeyDisposition,
    Keymap,
    SuggestCommand,
    SuggestKey,
  },
  session::{
    SessionId,
    SessionManager,
    SessionState,
    SuggestionSession,
  },
};
use crate::hook::{
  SuggestionEvent,
  SuggestionHook,
};

/// The inline suggestion engine, one per editor surface.
///
/// Created on surface attach, torn down on drop: dropping the engine
/// cancels any in-flight request, ends the live session, clears the
/// decoration, and stops the debounce hook. Must be constructed inside a
/// tokio runtime.
pub struct SuggestEngine<H: EditorHost> {
  state:   Arc<Mutex<SessionManager<H>>>,
  events:  Sender<SuggestionEvent>,
  keymap:  Keymap,
  enabled: bool,
}

impl<H: EditorHost> SuggestEngine<H> {
  pub fn attach<C: CompletionClient>(host: H, client: C, config: &SuggestConfig) -> Self {
    let state = Arc::new(Mutex::new(SessionManager::new(host)));
    let hook = SuggestionHook::new(Arc::clone(&state), Arc::new(client), config);
    let events = hook.spawn();
    SuggestEngine {
      state,
      events,
      keymap: config.keymap(),
      enabled: config.enabled,
    }
  }

  /// Notify the engine of a qualifying buffer mutation.
  ///
  /// Any edit invalidates the rendered suggestion immediately; a fresh
  /// session starts only once the quiet period elapses.
  pub fn on_edit(&self) {
    if !self.enabled {
      return;
    }
    self.state.lock().invalidate();
    send_blocking(&self.events, SuggestionEvent::Edit);
  }

  /// Offer a key press to the engine.
  ///
  /// `Consumed` only when a suggestion was actually resolved by the
  /// press; on `PassThrough` the shell's default handling proceeds (a
  /// literal tab, the usual escape behavior, and so on).
  pub fn handle_key(&self, key: SuggestKey) -> KeyDisposition {
    match self.keymap.command_for(key) {
      Some(SuggestCommand::Accept) => self.accept(),
      Some(SuggestCommand::Dismiss) => self.dismiss(),
      None => KeyDisposition::PassThrough,
    }
  }

  /// Commit the current suggestion at the live cursor.
  pub fn accept(&self) -> KeyDisposition {
    if self.state.lock().accept() {
      KeyDisposition::Consumed
    } else {
      KeyDisposition::PassThrough
    }
  }

  /// Discard the current suggestion.
  pub fn dismiss(&self) -> KeyDisposition {
    if self.state.lock().dismiss() {
      KeyDisposition::Consumed
    } else {
      KeyDisposition::PassThrough
    }
  }

  /// State of the current session, terminal or not.
  pub fn session_state(&self) -> Option<SessionState> {
    self.state.lock().current().map(|session| session.state())
  }

  /// Text of the live suggestion, if one is showing or still streaming.
  pub fn suggestion(&self) -> Option<String> {
    self
      .state
      .lock()
      .live()
      .map(|session| session.text().to_string())
  }
}

impl<H: EditorHost> Drop for SuggestEngine<H> {
  fn drop(&mut self) {
    self.state.lock().shutdown();
  }
}
