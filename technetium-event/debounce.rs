//! Framework for debounced async event handlers.

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};

/// Upper bound on how long [`send_blocking`] may stall the caller when the
/// channel is full. Events are advisory; dropping one beats freezing the
/// editor surface.
const SEND_TIMEOUT_MS: u64 = 2;

/// A background event handler with debounce support.
///
/// The hook runs as a tokio task draining an mpsc channel. Every received
/// event is handed to [`handle_event`](AsyncHook::handle_event) together
/// with the currently armed deadline (if any); the hook decides whether to
/// act immediately, keep the deadline, or re-arm it. When the deadline
/// elapses with no further events, [`finish_debounce`](AsyncHook::finish_debounce)
/// runs. At most one deadline is armed per hook, and arming always replaces
/// the previous one wholesale.
pub trait AsyncHook: Sync + Send + 'static + Sized {
  type Event: Sync + Send + 'static;

  /// React to an incoming event. Returning `Some(instant)` (re)arms the
  /// debounce deadline; returning `None` disarms it.
  fn handle_event(&mut self, event: Self::Event, deadline: Option<Instant>) -> Option<Instant>;

  /// Runs once the armed deadline elapses without interruption.
  fn finish_debounce(&mut self);

  /// Move the hook onto a background task and return the channel feeding it.
  fn spawn(self) -> mpsc::Sender<Self::Event> {
    // Headroom for bursts of edit events during fast typing; the loop
    // drains immediately so the channel is rarely anywhere near full.
    let (tx, rx) = mpsc::channel(256);
    // Skip the worker outside a runtime so plain unit tests can construct
    // hooks without spinning one up.
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(at) => {
        match tokio::time::timeout_at(at, rx.recv()).await {
          Ok(event) => event,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      // All senders dropped: the surface the hook served is gone.
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Deliver an event from synchronous code, stalling at most
/// [`SEND_TIMEOUT_MS`] when the channel is full. Events that still do not
/// fit are dropped.
pub fn send_blocking<T>(tx: &Sender<T>, event: T) {
  match tx.try_send(event) {
    Ok(()) => {},
    Err(TrySendError::Full(event)) => {
      let _ = block_on(tx.send_timeout(event, Duration::from_millis(SEND_TIMEOUT_MS)));
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("event dropped: hook channel is closed");
    },
  }
}

/// Non-blocking delivery. Returns whether the event was enqueued.
pub fn try_send<T>(tx: &Sender<T>, event: T) -> bool {
  tx.try_send(event).is_ok()
}
