//! Ghost text rendering: mirrors the current session's suggestion onto the
//! editor host's decoration surface.

use crate::host::{
  EditorHost,
  Position,
};

/// Render adapter for the provisional suggestion decoration.
///
/// Owns no suggestion state of its own, only whether a decoration is
/// currently on the surface, so the decoration can always be recomputed
/// from the session and `clear` stays idempotent. Never initiates state
/// changes; the session manager drives it.
pub struct GhostText {
  visible: bool,
}

impl GhostText {
  pub fn new() -> Self {
    GhostText { visible: false }
  }

  /// Replace the decoration with `text` anchored at `anchor`. Empty text
  /// clears instead: a decoration exists only for a non-empty suggestion.
  pub fn show<H: EditorHost>(&mut self, host: &mut H, anchor: Position, text: &str) {
    if text.is_empty() {
      self.clear(host);
      return;
    }
    host.set_ghost_text(anchor, text);
    self.visible = true;
  }

  /// Remove the decoration. A no-op when nothing is showing.
  pub fn clear<H: EditorHost>(&mut self, host: &mut H) {
    if self.visible {
      host.clear_ghost_text();
      self.visible = false;
    }
  }

  pub fn is_visible(&self) -> bool {
    self.visible
  }
}

impl Default for GhostText {
  fn default() -> Self {
    Self::new()
  }
}
