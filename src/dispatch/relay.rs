//! Ordered completion relay.
//!
//! Completions from the transport may arrive in any order. Each submission
//! reserves a [`Ticket`] carrying the next sequence number; completed
//! tickets are released onto the dispatch context strictly in sequence
//! order, holding back any that arrive ahead of their turn.

use super::context::{Job, ThreadContext};
use crate::metrics;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sequence-numbered reorder buffer in front of a [`ThreadContext`].
pub struct OrderedRelay {
    context: ThreadContext,
    state: Mutex<RelayState>,
}

#[derive(Default)]
struct RelayState {
    next_ticket: u64,
    next_delivery: u64,
    held: BTreeMap<u64, Job>,
}

impl OrderedRelay {
    pub fn new(context: ThreadContext) -> Arc<Self> {
        Arc::new(Self {
            context,
            state: Mutex::new(RelayState::default()),
        })
    }

    #[must_use]
    pub fn context(&self) -> &ThreadContext {
        &self.context
    }

    /// Reserve the next delivery slot.
    pub fn reserve(self: &Arc<Self>) -> Ticket {
        let mut state = self.state.lock();
        let sequence = state.next_ticket;
        state.next_ticket += 1;
        Ticket {
            sequence,
            relay: Some(self.clone()),
        }
    }

    /// Completions waiting for an earlier ticket.
    #[must_use]
    pub fn held(&self) -> usize {
        self.state.lock().held.len()
    }

    fn complete(&self, sequence: u64, job: Job) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if sequence != state.next_delivery {
            state.held.insert(sequence, job);
            metrics::adjust_held_completions(1);
            return;
        }
        // Enqueue under the lock so context order matches sequence order.
        self.context.execute(job);
        state.next_delivery += 1;
        while let Some(job) = state.held.remove(&state.next_delivery) {
            metrics::adjust_held_completions(-1);
            self.context.execute(job);
            state.next_delivery += 1;
        }
    }
}

impl std::fmt::Debug for OrderedRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OrderedRelay")
            .field("context", &self.context)
            .field("next_ticket", &state.next_ticket)
            .field("next_delivery", &state.next_delivery)
            .field("held", &state.held.len())
            .finish()
    }
}

/// A reserved delivery slot.
///
/// Dropping a ticket without completing it releases the slot empty so later
/// completions are not held forever.
#[must_use = "an unreleased ticket blocks every later completion until dropped"]
pub struct Ticket {
    sequence: u64,
    relay: Option<Arc<OrderedRelay>>,
}

impl Ticket {
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Run `job` on the context once every earlier ticket has been released.
    pub fn complete<F>(mut self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(relay) = self.relay.take() {
            relay.complete(self.sequence, Box::new(job));
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if let Some(relay) = self.relay.take() {
            relay.complete(self.sequence, Box::new(|| {}));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    async fn drain(relay: &OrderedRelay) {
        let (tx, rx) = oneshot::channel();
        relay.context().execute(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn out_of_order_completions_are_delivered_in_order() {
        let relay = OrderedRelay::new(ThreadContext::spawn("relay"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tickets: Vec<_> = (0..4).map(|_| relay.reserve()).collect();

        for index in [3usize, 1, 2] {
            let ticket = tickets.remove(tickets.iter().position(|t| t.sequence() == index as u64).unwrap());
            let seen = seen.clone();
            ticket.complete(move || seen.lock().push(index));
        }
        drain(&relay).await;
        assert!(seen.lock().is_empty());
        assert_eq!(relay.held(), 3);

        let seen_first = seen.clone();
        tickets.remove(0).complete(move || seen_first.lock().push(0));
        drain(&relay).await;
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
        assert_eq!(relay.held(), 0);
    }

    #[tokio::test]
    async fn dropped_ticket_releases_its_slot() {
        let relay = OrderedRelay::new(ThreadContext::spawn("relay"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let abandoned = relay.reserve();
        let next = relay.reserve();
        let sink = seen.clone();
        next.complete(move || sink.lock().push(1));
        drop(abandoned);
        drain(&relay).await;
        assert_eq!(*seen.lock(), vec![1]);
    }
}
