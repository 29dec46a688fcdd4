//! Engine configuration.
//!
//! Deserialized from the shell's toml config; every field has a default
//! so partial user config merges over the defaults field by field.

use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  client::DEFAULT_ENDPOINT,
  context::DEFAULT_CONTEXT_CHARS,
  keymap::{
    Keymap,
    SuggestKey,
  },
};

/// Default quiet interval after an edit before a request may fire.
pub const DEFAULT_DEBOUNCE_MS: u64 = 600;

/// Default token budget per completion request.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SuggestConfig {
  /// Whether inline suggestions are active at all.
  pub enabled:       bool,
  /// Debounce quiet interval in milliseconds.
  pub debounce_ms:   u64,
  /// Size of the context window sent with each request, in characters.
  pub context_chars: usize,
  /// Token budget per completion request.
  pub max_tokens:    u32,
  /// Base URL of the local model service.
  pub endpoint:      String,
  /// Key that accepts the current suggestion.
  pub accept_key:    SuggestKey,
  /// Key that dismisses the current suggestion.
  pub dismiss_key:   SuggestKey,
}

impl Default for SuggestConfig {
  fn default() -> Self {
    SuggestConfig {
      enabled:       true,
      debounce_ms:   DEFAULT_DEBOUNCE_MS,
      context_chars: DEFAULT_CONTEXT_CHARS,
      max_tokens:    DEFAULT_MAX_TOKENS,
      endpoint:      DEFAULT_ENDPOINT.to_string(),
      accept_key:    SuggestKey::Tab,
      dismiss_key:   SuggestKey::Escape,
    }
  }
}

impl SuggestConfig {
  pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(raw)
  }

  pub fn quiet_interval(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn keymap(&self) -> Keymap {
    Keymap::new(self.accept_key, self.dismiss_key)
  }
}
