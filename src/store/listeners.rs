// src/store/listeners.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`Listeners::subscribe`], needed to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Registry of callbacks notified with every emitted event.
///
/// Callbacks run synchronously on the thread that calls [`Listeners::emit`].
/// The registry lock is released before any callback runs, so a callback may
/// subscribe or unsubscribe without deadlocking.
pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(Subscription, Callback<E>)>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handle = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, Arc::new(callback)));
        handle
    }

    /// Remove a callback, returns false if the handle was unknown
    pub fn unsubscribe(&self, handle: Subscription) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every registered callback, in subscription order
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}

impl<E> Listeners<E>
where
    E: Clone + Send + 'static,
{
    /// Bridge the registry into a channel for async consumers.
    ///
    /// The channel is unbounded: a slow receiver accumulates events rather
    /// than slowing down the emitting thread.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.subscribe(move |event: &E| {
            if tx.send(event.clone()).is_err() {
                log::trace!("Listener channel closed, dropping event");
            }
        });
        (handle, rx)
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_reaches_every_subscriber_in_order() {
        let listeners = Listeners::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        listeners.subscribe(move |e| first.lock().unwrap().push(("a", *e)));
        let second = seen.clone();
        listeners.subscribe(move |e| second.lock().unwrap().push(("b", *e)));

        listeners.emit(&7);

        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let listeners = Listeners::<i32>::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let handle = listeners.subscribe(move |_| *counter.lock().unwrap() += 1);

        listeners.emit(&1);
        assert!(listeners.unsubscribe(handle));
        assert!(!listeners.unsubscribe(handle));
        listeners.emit(&2);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn callback_may_subscribe_while_emitting() {
        let listeners = Arc::new(Listeners::<i32>::new());
        let inner = listeners.clone();
        listeners.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        listeners.emit(&1);

        assert_eq!(listeners.len(), 2);
    }

    #[tokio::test]
    async fn channel_subscription_receives_events() {
        let listeners = Listeners::<String>::new();
        let (handle, mut rx) = listeners.subscribe_channel();

        listeners.emit(&"tick".to_string());
        listeners.unsubscribe(handle);
        listeners.emit(&"ignored".to_string());

        assert_eq!(rx.recv().await.as_deref(), Some("tick"));
        assert!(rx.recv().await.is_none());
    }
}
