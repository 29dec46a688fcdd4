//! Key bindings for resolving a suggestion.

use serde::{
  Deserialize,
  Serialize,
};

/// Keys the engine can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestKey {
  Tab,
  Escape,
  Enter,
  Right,
}

/// User-triggerable suggestion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestCommand {
  Accept,
  Dismiss,
}

/// What the embedding shell should do with a key press after the engine
/// has seen it.
///
/// `PassThrough` means the host's default handling proceeds unaffected
/// (e.g. a literal tab insertion); the engine only reports `Consumed`
/// when a suggestion was actually resolved by the press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
  Consumed,
  PassThrough,
}

/// Maps keys to suggestion commands. Two bindings, accept and dismiss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
  accept:  SuggestKey,
  dismiss: SuggestKey,
}

impl Keymap {
  pub fn new(accept: SuggestKey, dismiss: SuggestKey) -> Self {
    Keymap { accept, dismiss }
  }

  pub fn command_for(&self, key: SuggestKey) -> Option<SuggestCommand> {
    if key == self.accept {
      Some(SuggestCommand::Accept)
    } else if key == self.dismiss {
      Some(SuggestCommand::Dismiss)
    } else {
      None
    }
  }
}

impl Default for Keymap {
  fn default() -> Self {
    Keymap::new(SuggestKey::Tab, SuggestKey::Escape)
  }
}
