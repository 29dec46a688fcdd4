//! Suggestion session lifecycle.
//!
//! A session is one debounced suggestion attempt: a context snapshot, an
//! anchor, the text streamed back so far, and a state machine. The
//! [`SessionManager`] owns at most one live session at a time and is the
//! single place stream events enter the engine, so every staleness check
//! happens at one choke point instead of inside per-request callbacks.

use std::fmt;

use technetium_event::{
  TaskController,
  TaskHandle,
};

use crate::{
  context,
  host::{
    EditorHost,
    Position,
  },
  render::GhostText,
};

/// Opaque token correlating a session with the stream events of the
/// request issued for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "s{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  /// Request sent, no chunk received yet.
  Pending,
  /// At least one chunk received, not finalized.
  Streaming,
  /// Finalization received; text frozen but still visible.
  Ready,
  Accepted,
  Dismissed,
  Superseded,
  Failed,
}

impl SessionState {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      SessionState::Accepted
        | SessionState::Dismissed
        | SessionState::Superseded
        | SessionState::Failed
    )
  }

  /// Whether the session may still append chunk text.
  fn accepts_chunks(self) -> bool {
    matches!(self, SessionState::Pending | SessionState::Streaming)
  }
}

/// One in-flight or resolved suggestion attempt.
#[derive(Debug)]
pub struct SuggestionSession {
  id:      SessionId,
  context: String,
  anchor:  Position,
  text:    String,
  state:   SessionState,
}

impl SuggestionSession {
  pub fn id(&self) -> SessionId {
    self.id
  }

  /// The context window sent to the model; immutable once the session
  /// starts.
  pub fn context(&self) -> &str {
    &self.context
  }

  /// Cursor position at session creation; the suggestion always renders
  /// from here even if the cursor has since moved.
  pub fn anchor(&self) -> Position {
    self.anchor
  }

  /// Chunks received so far, in arrival order.
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn state(&self) -> SessionState {
    self.state
  }
}

/// An event delivered by a request task, already stripped of payload the
/// engine does not need. Finalization carries no text: every fragment
/// arrives as a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
  Chunk(String),
  Finished,
  Failed,
}

/// Everything a request task needs, handed out by
/// [`SessionManager::begin`]. The session is recorded before this value
/// exists, so no stream event can ever reference an id the manager does
/// not know.
pub struct PreparedRequest {
  pub id:      SessionId,
  pub context: String,
  pub handle:  TaskHandle,
}

/// Owns the current session, the editor host, and the ghost-text adapter.
///
/// All mutation flows through `&mut self` methods; the engine facade
/// serializes callers behind one lock, so every transition here runs as a
/// discrete turn.
pub struct SessionManager<H: EditorHost> {
  host:       H,
  ghost:      GhostText,
  controller: TaskController,
  current:    Option<SuggestionSession>,
  next_id:    u64,
}

impl<H: EditorHost> SessionManager<H> {
  pub fn new(host: H) -> Self {
    SessionManager {
      host,
      ghost: GhostText::new(),
      controller: TaskController::new(),
      current: None,
      next_id: 0,
    }
  }

  pub fn current(&self) -> Option<&SuggestionSession> {
    self.current.as_ref()
  }

  /// The current session if it is still live (non-terminal).
  pub fn live(&self) -> Option<&SuggestionSession> {
    self
      .current
      .as_ref()
      .filter(|session| !session.state.is_terminal())
  }

  pub fn host(&self) -> &H {
    &self.host
  }

  pub fn host_mut(&mut self) -> &mut H {
    &mut self.host
  }

  /// Start a new session at the live cursor.
  ///
  /// Supersedes any live session, cancels its request task, snapshots the
  /// context window, and records the new session as `Pending` before
  /// returning the request the caller is to issue. Returns `None` when
  /// the host has no cursor; the previous session is left untouched then.
  pub fn begin(&mut self, context_chars: usize) -> Option<PreparedRequest> {
    let anchor = self.host.cursor()?;
    self.supersede();

    self.next_id += 1;
    let id = SessionId(self.next_id);
    let before = self.host.text_before(anchor);
    let snapshot = context::tail_window(&before, context_chars).to_owned();
    let handle = self.controller.restart();

    log::debug!("{id}: new suggestion session ({} chars of context)", snapshot.chars().count());
    self.current = Some(SuggestionSession {
      id,
      context: snapshot.clone(),
      anchor,
      text: String::new(),
      state: SessionState::Pending,
    });

    Some(PreparedRequest {
      id,
      context: snapshot,
      handle,
    })
  }

  /// The single ingestion choke point for stream events.
  ///
  /// Events whose id does not match the current live session are inert:
  /// they never mutate state and never touch the render surface. Chunk
  /// text is append-only, and a chunk arriving after finalization is
  /// ignored even for the current session.
  pub fn apply(&mut self, id: SessionId, update: StreamUpdate) {
    let Some(session) = self.current.as_mut() else {
      log::debug!("{id}: stream event with no session, ignoring");
      return;
    };
    if session.id != id || session.state.is_terminal() {
      log::debug!("{id}: stale stream event (current {}), ignoring", session.id);
      return;
    }

    match update {
      StreamUpdate::Chunk(fragment) => {
        if !session.state.accepts_chunks() {
          return;
        }
        session.text.push_str(&fragment);
        session.state = SessionState::Streaming;
        self.ghost.show(&mut self.host, session.anchor, &session.text);
      },
      StreamUpdate::Finished => {
        if session.state.accepts_chunks() {
          session.state = SessionState::Ready;
        }
      },
      StreamUpdate::Failed => {
        if session.state.accepts_chunks() {
          session.state = SessionState::Failed;
          self.ghost.clear(&mut self.host);
        }
      },
    }
  }

  /// Resolve the live session by committing its text at the live cursor.
  ///
  /// Returns whether a non-empty suggestion was actually consumed; on
  /// `false` the caller lets the host's default key handling proceed.
  pub fn accept(&mut self) -> bool {
    let Some(session) = self.current.as_mut() else {
      return false;
    };
    if session.state.is_terminal() || session.text.is_empty() {
      return false;
    }

    let text = std::mem::take(&mut session.text);
    session.state = SessionState::Accepted;
    self.controller.cancel();
    // Insertion targets the live cursor, not the anchor: the render
    // itself may have moved the cursor since anchor capture.
    self.host.insert_at_cursor(&text);
    self.ghost.clear(&mut self.host);
    log::debug!("{}: suggestion accepted ({} bytes)", session.id, text.len());
    true
  }

  /// Discard the live session. Returns whether a visible suggestion was
  /// discarded; a chunk-less `Pending` session is dismissed silently and
  /// the key passes through.
  pub fn dismiss(&mut self) -> bool {
    let Some(session) = self.current.as_mut() else {
      return false;
    };
    if session.state.is_terminal() {
      return false;
    }

    let had_text = !session.text.is_empty();
    session.text.clear();
    session.state = SessionState::Dismissed;
    self.controller.cancel();
    self.ghost.clear(&mut self.host);
    log::debug!("{}: suggestion dismissed", session.id);
    had_text
  }

  /// Invalidate the rendered suggestion because the buffer changed.
  ///
  /// Policy: any edit supersedes the live session; a fresh session may be
  /// started independently once the debounce quiet period elapses.
  pub fn invalidate(&mut self) {
    self.supersede();
  }

  /// Teardown on editor-surface detach: cancel in-flight work, end the
  /// live session, clear the decoration.
  pub fn shutdown(&mut self) {
    self.supersede();
  }

  fn supersede(&mut self) {
    self.controller.cancel();
    if let Some(session) = self.current.as_mut() {
      if !session.state.is_terminal() {
        session.state = SessionState::Superseded;
        self.ghost.clear(&mut self.host);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use parking_lot::Mutex;
  use quickcheck::{
    Arbitrary,
    Gen,
    quickcheck,
  };

  use super::*;

  /// Host double recording every call the engine makes.
  #[derive(Default)]
  struct HostLog {
    insertions: Vec<String>,
    ghost:      Option<(Position, String)>,
    clears:     usize,
  }

  #[derive(Clone, Default)]
  struct MockHost {
    cursor: Option<Position>,
    before: String,
    log:    Arc<Mutex<HostLog>>,
  }

  impl MockHost {
    fn at(line: usize, column: usize) -> Self {
      MockHost {
        cursor: Some(Position::new(line, column)),
        before: "fn main() {\n    let value = ".to_string(),
        log: Arc::default(),
      }
    }
  }

  impl EditorHost for MockHost {
    fn cursor(&self) -> Option<Position> {
      self.cursor
    }

    fn text_before(&self, _position: Position) -> String {
      self.before.clone()
    }

    fn insert_at_cursor(&mut self, text: &str) {
      self.log.lock().insertions.push(text.to_string());
    }

    fn set_ghost_text(&mut self, anchor: Position, text: &str) {
      self.log.lock().ghost = Some((anchor, text.to_string()));
    }

    fn clear_ghost_text(&mut self) {
      let mut log = self.log.lock();
      log.ghost = None;
      log.clears += 1;
    }
  }

  fn manager_with_session() -> (SessionManager<MockHost>, SessionId, Arc<Mutex<HostLog>>) {
    let host = MockHost::at(1, 28);
    let log = host.log.clone();
    let mut manager = SessionManager::new(host);
    let prepared = manager.begin(DEFAULT_BUDGET).unwrap();
    (manager, prepared.id, log)
  }

  const DEFAULT_BUDGET: usize = 1200;

  fn foreign(id: SessionId) -> SessionId {
    SessionId(id.0 + 1000)
  }

  #[test]
  fn first_chunk_moves_pending_to_streaming() {
    let (mut manager, id, log) = manager_with_session();
    assert_eq!(manager.current().unwrap().state(), SessionState::Pending);

    manager.apply(id, StreamUpdate::Chunk("foo".into()));
    let session = manager.current().unwrap();
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.text(), "foo");
    assert_eq!(
      log.lock().ghost,
      Some((Position::new(1, 28), "foo".to_string()))
    );
  }

  #[test]
  fn foreign_events_are_inert() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("foo".into()));

    manager.apply(foreign(id), StreamUpdate::Chunk("bar".into()));
    manager.apply(foreign(id), StreamUpdate::Finished);
    manager.apply(foreign(id), StreamUpdate::Failed);

    let session = manager.current().unwrap();
    assert_eq!(session.text(), "foo");
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(log.lock().ghost.as_ref().unwrap().1, "foo");
  }

  #[test]
  fn superseding_redirects_ingestion_to_the_new_session() {
    let (mut manager, first, _log) = manager_with_session();
    manager.apply(first, StreamUpdate::Chunk("foo".into()));

    let second = manager.begin(DEFAULT_BUDGET).unwrap().id;
    // Late chunk for the superseded session is ignored; the new session
    // accumulates independently.
    manager.apply(first, StreamUpdate::Chunk("baz".into()));
    manager.apply(second, StreamUpdate::Chunk("qux".into()));

    let session = manager.current().unwrap();
    assert_eq!(session.id(), second);
    assert_eq!(session.text(), "qux");
  }

  #[test]
  fn finalization_freezes_text_but_keeps_it_visible() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("let x = 1;".into()));
    manager.apply(id, StreamUpdate::Finished);

    let session = manager.current().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(log.lock().ghost.is_some());

    // A chunk straggling in after finalization appends nothing.
    manager.apply(id, StreamUpdate::Chunk("oops".into()));
    assert_eq!(manager.current().unwrap().text(), "let x = 1;");
  }

  #[test]
  fn accept_inserts_exactly_once_and_clears_the_decoration() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("foo".into()));
    manager.apply(id, StreamUpdate::Chunk("bar".into()));

    assert!(manager.accept());
    assert_eq!(manager.current().unwrap().state(), SessionState::Accepted);
    {
      let log = log.lock();
      assert_eq!(log.insertions, vec!["foobar".to_string()]);
      assert_eq!(log.ghost, None);
    }

    // A second accept has nothing left to consume.
    assert!(!manager.accept());
    assert_eq!(log.lock().insertions.len(), 1);
  }

  #[test]
  fn accept_with_empty_text_never_inserts() {
    let (mut manager, _id, log) = manager_with_session();
    assert!(!manager.accept());
    assert!(log.lock().insertions.is_empty());
    // Still pending: the empty accept fell through without resolving.
    assert_eq!(manager.current().unwrap().state(), SessionState::Pending);
  }

  #[test]
  fn dismiss_clears_without_touching_the_buffer() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("foo".into()));

    assert!(manager.dismiss());
    let session = manager.current().unwrap();
    assert_eq!(session.state(), SessionState::Dismissed);
    assert_eq!(session.text(), "");
    let log = log.lock();
    assert!(log.insertions.is_empty());
    assert_eq!(log.ghost, None);
  }

  #[test]
  fn dismissing_a_chunkless_pending_session_is_safe() {
    let (mut manager, _id, log) = manager_with_session();
    // No text yet, so the key should pass through, but the session ends.
    assert!(!manager.dismiss());
    assert_eq!(manager.current().unwrap().state(), SessionState::Dismissed);
    assert!(log.lock().insertions.is_empty());
  }

  #[test]
  fn dismiss_without_a_session_is_a_noop() {
    let mut manager = SessionManager::new(MockHost::at(0, 0));
    assert!(!manager.dismiss());
  }

  #[test]
  fn edit_invalidates_the_rendered_suggestion() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("foo".into()));

    manager.invalidate();
    assert_eq!(manager.current().unwrap().state(), SessionState::Superseded);
    assert_eq!(log.lock().ghost, None);

    // Chunks for the superseded session stay inert.
    manager.apply(id, StreamUpdate::Chunk("bar".into()));
    assert_eq!(manager.current().unwrap().text(), "foo");
  }

  #[test]
  fn transport_failure_is_silent_and_terminal() {
    let (mut manager, id, log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("fo".into()));
    manager.apply(id, StreamUpdate::Failed);

    assert_eq!(manager.current().unwrap().state(), SessionState::Failed);
    assert_eq!(log.lock().ghost, None);

    manager.apply(id, StreamUpdate::Chunk("o".into()));
    assert_eq!(manager.current().unwrap().text(), "fo");
  }

  #[test]
  fn begin_without_a_cursor_leaves_the_session_alone() {
    let (mut manager, id, _log) = manager_with_session();
    manager.apply(id, StreamUpdate::Chunk("foo".into()));

    manager.host_mut().cursor = None;
    assert!(manager.begin(DEFAULT_BUDGET).is_none());
    let session = manager.current().unwrap();
    assert_eq!(session.id(), id);
    assert_eq!(session.state(), SessionState::Streaming);
  }

  #[test]
  fn context_snapshot_is_bounded() {
    let mut host = MockHost::at(0, 0);
    host.before = "x".repeat(5000);
    let mut manager = SessionManager::new(host);
    let prepared = manager.begin(1200).unwrap();
    assert_eq!(prepared.context.chars().count(), 1200);
    assert_eq!(manager.current().unwrap().context(), prepared.context);
  }

  // Arbitrary interleaving of own/foreign stream events: accumulated text
  // never shrinks while the session is live, and foreign events never
  // change it at all.
  #[derive(Clone, Debug)]
  enum Op {
    OwnChunk(String),
    ForeignChunk(String),
    OwnFinish,
    ForeignFinish,
    OwnFail,
    ForeignFail,
  }

  impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
      let kind = u8::arbitrary(g) % 6;
      let fragment = "ab".repeat((u8::arbitrary(g) % 4) as usize);
      match kind {
        0 => Op::OwnChunk(fragment),
        1 => Op::ForeignChunk(fragment),
        2 => Op::OwnFinish,
        3 => Op::ForeignFinish,
        4 => Op::OwnFail,
        _ => Op::ForeignFail,
      }
    }
  }

  quickcheck! {
    fn accumulated_text_is_append_only(ops: Vec<Op>) -> bool {
      let (mut manager, id, _log) = manager_with_session();
      let mut last_len = 0usize;
      for op in ops {
        let before_foreign = manager.current().map(|s| (s.text().to_string(), s.state()));
        let foreign_op = matches!(
          op,
          Op::ForeignChunk(_) | Op::ForeignFinish | Op::ForeignFail
        );
        match op {
          Op::OwnChunk(text) => manager.apply(id, StreamUpdate::Chunk(text)),
          Op::ForeignChunk(text) => manager.apply(foreign(id), StreamUpdate::Chunk(text)),
          Op::OwnFinish => manager.apply(id, StreamUpdate::Finished),
          Op::ForeignFinish => manager.apply(foreign(id), StreamUpdate::Finished),
          Op::OwnFail => manager.apply(id, StreamUpdate::Failed),
          Op::ForeignFail => manager.apply(foreign(id), StreamUpdate::Failed),
        }
        let session = manager.current().unwrap();
        if foreign_op {
          let (text, state) = before_foreign.unwrap();
          if session.text() != text || session.state() != state {
            return false;
          }
        }
        if !session.state().is_terminal() {
          if session.text().len() < last_len {
            return false;
          }
          last_len = session.text().len();
        }
      }
      true
    }
  }
}
