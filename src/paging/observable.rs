//! Observable value holder.

use tokio::sync::watch;

/// A value with a current-value read and change subscriptions.
///
/// Writers replace the whole value; subscribers see the latest value and are
/// woken once per change. Dropping a receiver unsubscribes it.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    /// Creates a holder with an initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Reads the current value without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Subscribes to changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Edits the value in place and notifies subscribers.
    pub fn update(&self, edit: impl FnOnce(&mut T)) {
        self.tx.send_modify(edit);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_set() {
        let value = Observable::new(1);
        value.set(2);
        assert_eq!(value.get(), 2);
        value.update(|v| *v += 1);
        assert_eq!(value.get(), 3);
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let value = Observable::new(Vec::<u32>::new());
        let mut rx = value.subscribe();
        assert_eq!(value.subscriber_count(), 1);

        value.update(|v| v.push(7));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), vec![7]);

        drop(rx);
        assert_eq!(value.subscriber_count(), 0);
    }
}
