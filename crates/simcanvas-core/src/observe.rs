//! Listener lists for store change notification.

/// Handle returned by [`Listeners::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered set of callbacks invoked once per state transition.
pub struct Listeners<T> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| *sid != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self, state: &T) {
        for (_, listener) in self.entries.iter_mut() {
            listener(state);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_and_unsubscribe() {
        let mut listeners = Listeners::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let id = listeners.subscribe(move |v| {
            h.fetch_add(*v as usize, Ordering::SeqCst);
        });

        listeners.notify(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.notify(&5);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(listeners.is_empty());
    }
}
