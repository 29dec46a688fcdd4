//! The seam between the suggestion engine and the editor surface that
//! embeds it.

/// A cursor position on the editor surface, in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
  pub line:   usize,
  pub column: usize,
}

impl Position {
  pub fn new(line: usize, column: usize) -> Self {
    Position { line, column }
  }
}

/// Everything the engine needs from the embedding editor.
///
/// The engine never reaches into the buffer directly; it reads the cursor
/// and the text leading up to it, inserts accepted suggestions at the live
/// cursor, and paints ghost text through the decoration calls. Setting
/// ghost text replaces whatever ghost text was previously showing;
/// clearing with nothing showing must be harmless.
pub trait EditorHost: Send + 'static {
  /// Current cursor position, or `None` when the surface has no focus
  /// (no suggestion work happens then).
  fn cursor(&self) -> Option<Position>;

  /// All buffer text strictly before `position`.
  fn text_before(&self, position: Position) -> String;

  /// Insert `text` literally at the live cursor position.
  fn insert_at_cursor(&mut self, text: &str);

  /// Show `text` as non-editable inline content starting at `anchor`.
  fn set_ghost_text(&mut self, anchor: Position, text: &str);

  /// Remove any ghost text from the surface.
  fn clear_ghost_text(&mut self);
}
