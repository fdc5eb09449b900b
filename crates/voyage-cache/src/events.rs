//! Change notification for cache entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use voyage_data::FetchError;

use crate::dedupe::lock;
use crate::QueryKey;

/// A change to a cache entry.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// Entry data changed: fetched, written, optimistically updated or
    /// rolled back.
    Updated { key: QueryKey },
    /// Entry marked stale.
    Invalidated { key: QueryKey },
    /// A fetch for the entry failed.
    Failed { key: QueryKey, error: Arc<FetchError> },
}

impl CacheEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            Self::Updated { key } | Self::Invalidated { key } | Self::Failed { key, .. } => key,
        }
    }
}

/// Callback invoked for matching cache events.
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct Registration {
    id: u64,
    prefix: QueryKey,
    listener: Listener,
}

/// Listeners keyed by the prefix they watch.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(self: &Arc<Self>, prefix: QueryKey, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.registrations).push(Registration {
            id,
            prefix,
            listener,
        });
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver events. Listeners run after the registry lock is released so
    /// they may read the store or subscribe.
    pub(crate) fn notify(&self, events: &[CacheEvent]) {
        if events.is_empty() {
            return;
        }
        for event in events {
            let targets: Vec<Listener> = lock(&self.registrations)
                .iter()
                .filter(|r| r.prefix.is_prefix_of(event.key()))
                .map(|r| Arc::clone(&r.listener))
                .collect();
            for listener in targets {
                listener(event);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.registrations).len()
    }

    fn remove(&self, id: u64) {
        lock(&self.registrations).retain(|r| r.id != id);
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(count: &Arc<AtomicU64>) -> Listener {
        let count = Arc::clone(count);
        Arc::new(move |_: &CacheEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_prefix_filtering() {
        let registry = Arc::new(ListenerRegistry::default());
        let properties = Arc::new(AtomicU64::new(0));
        let packages = Arc::new(AtomicU64::new(0));
        let _a = registry.subscribe(QueryKey::new("properties"), counting(&properties));
        let _b = registry.subscribe(QueryKey::new("packages"), counting(&packages));

        registry.notify(&[CacheEvent::Updated {
            key: QueryKey::new("properties").with("detail").with(42_u64),
        }]);

        assert_eq!(properties.load(Ordering::SeqCst), 1);
        assert_eq!(packages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = Arc::new(ListenerRegistry::default());
        let count = Arc::new(AtomicU64::new(0));
        let subscription = registry.subscribe(QueryKey::new("properties"), counting(&count));
        assert_eq!(registry.len(), 1);

        subscription.cancel();
        assert_eq!(registry.len(), 0);
        registry.notify(&[CacheEvent::Invalidated {
            key: QueryKey::new("properties"),
        }]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
