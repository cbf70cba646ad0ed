//! # Subscription Registry
//!
//! In-memory mapping from `(audience, selector)` to subscription channels.
//! Nothing is persisted: a restarted process re-subscribes at startup.

use bridge_types::EventEnvelope;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::subscriber::{Audience, EventSelector, SubscriptionHandle, SubscriptionId};

type SlotKey = (Audience, EventSelector);

struct Slot {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Arc<EventEnvelope>>,
}

/// Registry of active subscriptions.
///
/// Reads (routing) and writes (subscribe/unsubscribe) go through one
/// `RwLock`, so a route never iterates a slot list that is being mutated.
#[derive(Default)]
pub struct SubscriptionRegistry {
    slots: RwLock<HashMap<SlotKey, Vec<Slot>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and return the receiving end of its channel.
    pub fn register(
        &self,
        selector: EventSelector,
        audience: Audience,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<Arc<EventEnvelope>>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.slots
            .write()
            .entry((audience, selector))
            .or_default()
            .push(Slot { id, sender });

        debug!(subscription = %id, audience = %audience, selector = ?selector, "Subscription registered");

        (
            SubscriptionHandle {
                id,
                selector,
                audience,
            },
            receiver,
        )
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    ///
    /// Events already queued for the subscription are still handed to it;
    /// nothing new is enqueued after this returns.
    pub fn unregister(&self, handle: &SubscriptionHandle) -> bool {
        let mut slots = self.slots.write();
        let key = (handle.audience, handle.selector);
        let Some(list) = slots.get_mut(&key) else {
            return false;
        };

        let before = list.len();
        list.retain(|slot| slot.id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            slots.remove(&key);
        }

        if removed {
            debug!(subscription = %handle.id, "Subscription removed");
        }
        removed
    }

    /// Enqueue an event for every subscription of `audience` whose selector
    /// accepts it. Returns the number of subscriptions reached.
    ///
    /// Slots whose receiver was dropped are removed on the way.
    pub fn deliver(&self, audience: Audience, event: &Arc<EventEnvelope>) -> usize {
        let keys = [
            (audience, EventSelector::Only(event.event_type)),
            (audience, EventSelector::Any),
        ];

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let slots = self.slots.read();
            for key in &keys {
                let Some(list) = slots.get(key) else {
                    continue;
                };
                for slot in list {
                    if slot.sender.send(Arc::clone(event)).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push((*key, slot.id));
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.prune(&closed);
        }
        delivered
    }

    fn prune(&self, closed: &[(SlotKey, SubscriptionId)]) {
        let mut slots = self.slots.write();
        for (key, id) in closed {
            if let Some(list) = slots.get_mut(key) {
                list.retain(|slot| slot.id != *id);
                if list.is_empty() {
                    slots.remove(key);
                }
            }
            debug!(subscription = %id, "Subscriber channel closed, removed");
        }
    }

    /// Number of active subscriptions. Slots whose receiver is gone are not
    /// counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .flatten()
            .filter(|slot| !slot.sender.is_closed())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscription. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.write();
        let removed = slots.values().map(Vec::len).sum();
        slots.clear();
        removed
    }
}
