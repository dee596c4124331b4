//! Memoized single-flight futures.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;

/// Holds at most one in-flight (or completed) shared future.
///
/// Concurrent callers of [`SingleFlight::get_or_start`] observe the same
/// future. The slot is checked once under the read lock and again under the
/// write lock before a new future is created.
pub struct SingleFlight<T: Clone> {
    slot: RwLock<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub fn get_or_start<F>(&self, start: F) -> Shared<BoxFuture<'static, T>>
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        if let Some(existing) = self.slot.read().as_ref() {
            return existing.clone();
        }
        let mut slot = self.slot.write();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let flight = start().shared();
        *slot = Some(flight.clone());
        flight
    }

    /// The completed result, if the held future has finished.
    pub fn peek(&self) -> Option<T> {
        self.slot.read().as_ref().and_then(|flight| flight.peek().cloned())
    }

    pub fn is_started(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Forget the held future so the next caller starts a new one.
    pub fn clear(&self) {
        self.slot.write().take();
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let starts = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let mut rx = Some(rx);

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let starts = starts.clone();
            let future = flight.get_or_start(|| {
                starts.fetch_add(1, Ordering::SeqCst);
                let rx = rx.take().unwrap();
                async move { rx.await.unwrap() }.boxed()
            });
            waiters.push(tokio::spawn(future));
        }
        tx.send(7).unwrap();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 7);
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(flight.peek(), Some(7));
    }

    #[tokio::test]
    async fn clear_allows_a_new_attempt() {
        let flight = SingleFlight::<u32>::new();
        assert_eq!(flight.get_or_start(|| async { 1 }.boxed()).await, 1);
        assert_eq!(flight.get_or_start(|| async { 2 }.boxed()).await, 1);
        flight.clear();
        assert!(!flight.is_started());
        assert_eq!(flight.get_or_start(|| async { 2 }.boxed()).await, 2);
    }
}
