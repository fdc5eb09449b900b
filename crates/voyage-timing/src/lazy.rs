//! Intersection-based lazy triggering.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::lock;

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Grow by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Overlapping region, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

type Action = Box<dyn FnOnce() + Send>;

/// Fires a one-shot action the first time a target becomes visible enough.
///
/// Visibility is the share of the target's area inside the viewport grown by
/// `root_margin`. The action runs once, on the first observation at or above
/// `threshold`.
pub struct LazyTrigger {
    threshold: f64,
    root_margin: f64,
    action: Mutex<Option<Action>>,
    seen: Mutex<bool>,
}

impl LazyTrigger {
    /// Trigger with a 10% threshold and a 50 unit root margin.
    pub fn new() -> Self {
        Self {
            threshold: 0.1,
            root_margin: 50.0,
            action: Mutex::new(None),
            seen: Mutex::new(false),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_root_margin(mut self, margin: f64) -> Self {
        self.root_margin = margin;
        self
    }

    /// Register the action to fire on first visibility.
    pub fn on_visible(self, action: impl FnOnce() + Send + 'static) -> Self {
        *lock(&self.action) = Some(Box::new(action));
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn root_margin(&self) -> f64 {
        self.root_margin
    }

    /// Share of `target` inside the margin-expanded `viewport`, in `0.0..=1.0`.
    pub fn ratio(&self, target: &Rect, viewport: &Rect) -> f64 {
        let area = target.area();
        let root = viewport.expand(self.root_margin);
        match target.intersection(&root) {
            // A zero-area target counts as fully visible when it touches the root.
            Some(_) if area == 0.0 => 1.0,
            Some(overlap) => (overlap.area() / area).min(1.0),
            None => 0.0,
        }
    }

    /// Report a new layout. Returns whether the target is currently visible.
    pub fn observe(&self, target: &Rect, viewport: &Rect) -> bool {
        let ratio = self.ratio(target, viewport);
        let visible = ratio > 0.0 && ratio >= self.threshold;
        if visible {
            *lock(&self.seen) = true;
            let action = lock(&self.action).take();
            if let Some(action) = action {
                tracing::trace!(ratio, "lazy trigger fired");
                action();
            }
        }
        visible
    }

    /// Whether the target has ever been visible.
    pub fn has_been_visible(&self) -> bool {
        *lock(&self.seen)
    }

    /// Drop the pending action without firing it.
    pub fn disconnect(&self) {
        lock(&self.action).take();
    }

    /// Whether an action is still waiting to fire.
    pub fn is_armed(&self) -> bool {
        lock(&self.action).is_some()
    }
}

impl Default for LazyTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LazyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTrigger")
            .field("threshold", &self.threshold)
            .field("root_margin", &self.root_margin)
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const VIEWPORT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 800.0,
    };

    #[test]
    fn test_root_margin_extends_viewport() {
        let trigger = LazyTrigger::new();
        // Entirely below the fold but inside the 50 unit margin.
        let target = Rect::new(0.0, 820.0, 400.0, 100.0);
        assert!((trigger.ratio(&target, &VIEWPORT) - 0.3).abs() < 1e-9);

        let far = Rect::new(0.0, 1000.0, 400.0, 100.0);
        assert_eq!(trigger.ratio(&far, &VIEWPORT), 0.0);
    }

    #[test]
    fn test_fires_once_at_threshold() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let trigger = LazyTrigger::new().on_visible(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // 5% visible: below the 10% threshold.
        let sliver = Rect::new(0.0, 845.0, 400.0, 100.0);
        assert!(!trigger.observe(&sliver, &VIEWPORT));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let visible = Rect::new(0.0, 600.0, 400.0, 100.0);
        assert!(trigger.observe(&visible, &VIEWPORT));
        assert!(trigger.observe(&visible, &VIEWPORT));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(trigger.has_been_visible());
        assert!(!trigger.is_armed());
    }

    #[test]
    fn test_disconnect_drops_action() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let trigger = LazyTrigger::new().on_visible(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        trigger.disconnect();
        assert!(trigger.observe(&Rect::new(0.0, 0.0, 100.0, 100.0), &VIEWPORT));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
