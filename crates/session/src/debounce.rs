//! Trailing-edge debouncer for durable writes.
//!
//! Each `schedule` replaces the pending action and restarts the quiet
//! period; the action runs once the window elapses with no further call.
//! Only the side effect is delayed, never the in-memory mutation.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type Action = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct DebounceState {
    generation: u64,
    action: Option<Action>,
    timer: Option<JoinHandle<()>>,
}

/// A single pending task, reset by every new schedule.
pub struct Debouncer {
    window: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the pending action with `action` and restart the timer.
    ///
    /// With a zero window, or outside a tokio runtime, the action runs
    /// immediately.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current();
        if self.window.is_zero() || runtime.is_err() {
            self.cancel();
            action();
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        let generation = state.generation;
        state.action = Some(Box::new(action));

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let shared = Arc::clone(&self.state);
        let window = self.window;
        let handle = runtime.map(|rt| {
            rt.spawn(async move {
                tokio::time::sleep(window).await;

                let action = {
                    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    if state.generation != generation {
                        return;
                    }
                    state.timer = None;
                    state.action.take()
                };

                if let Some(action) = action {
                    tracing::trace!("Debounce window elapsed; running pending action");
                    action();
                }
            })
        });
        state.timer = handle.ok();
    }

    /// Run the pending action now, if there is one.
    pub fn flush(&self) -> bool {
        let action = self.take_pending();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Drop the pending action without running it.
    pub fn cancel(&self) {
        drop(self.take_pending());
    }

    pub fn is_pending(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .action
            .is_some()
    }

    fn take_pending(&self) -> Option<Action> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.action.take()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if self.flush() {
            tracing::debug!("Flushed pending write on drop");
        }
    }
}
