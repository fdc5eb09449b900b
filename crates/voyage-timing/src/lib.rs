//! Request-shaping utilities for the voyage data layer.
//!
//! This crate provides:
//! - `Debouncer` - Propagates a value only after it has been stable for a quiet window
//! - `Throttle` - Runs at most one call per window, dropping the rest
//! - `LazyTrigger` - Fires a one-shot action when a target scrolls into view

use std::sync::{Mutex, MutexGuard};

mod debounce;
mod lazy;
mod throttle;

pub use debounce::*;
pub use lazy::*;
pub use throttle::*;

/// Lock `mutex`, recovering the guard if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
