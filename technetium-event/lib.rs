//! Async event infrastructure shared by the technetium editor shell.
//!
//! Two building blocks live here: [`AsyncHook`], a framework for debounced
//! background event handlers, and the [`TaskController`]/[`TaskHandle`] pair
//! used to cancel in-flight request tasks when the work they were spawned
//! for is no longer wanted.

mod cancel;
mod debounce;

pub use cancel::{
  TaskController,
  TaskHandle,
  cancelable_future,
};
pub use debounce::{
  AsyncHook,
  send_blocking,
  try_send,
};
