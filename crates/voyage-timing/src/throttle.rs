//! Leading-edge throttling.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::lock;

/// Runs at most one call per window.
///
/// The first call runs immediately and opens a window; calls inside the
/// window are dropped, not queued.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: Mutex::new(None),
        }
    }

    /// The throttle window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `f` if the window has elapsed, returning its result.
    ///
    /// Returns `None` without calling `f` when the call is dropped.
    pub fn call<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        {
            let mut last_run = lock(&self.last_run);
            let now = Instant::now();
            if let Some(last) = *last_run {
                if now.duration_since(last) < self.window {
                    return None;
                }
            }
            *last_run = Some(now);
        }
        Some(f())
    }

    /// Whether a call made now would run.
    pub fn is_ready(&self) -> bool {
        match *lock(&self.last_run) {
            Some(last) => last.elapsed() >= self.window,
            None => true,
        }
    }

    /// Forget the last run so the next call runs immediately.
    pub fn reset(&self) {
        *lock(&self.last_run) = None;
    }
}
