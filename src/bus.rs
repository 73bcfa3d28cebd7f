//! In-process publish/subscribe for chat events.
//!
//! The bus has four independent channels (see [`EventChannel`]). Dispatch
//! is synchronous and in publish order. Each publish delivers to the
//! subscribers registered when it started, exactly once each; the
//! subscriber list is snapshotted and the lock released before any handler
//! runs, so handlers may subscribe, unsubscribe or publish from inside a
//! callback without deadlocking.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use slirc_tmi::{ChatEvent, EventBus, EventChannel};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let id = bus.subscribe(EventChannel::Message, move |e: &ChatEvent| {
//!     sink.lock().unwrap().push(e.clone());
//! });
//!
//! bus.publish(&ChatEvent::Message { sender: "a".into(), body: "hi".into() });
//! assert_eq!(seen.lock().unwrap().len(), 1);
//!
//! assert!(bus.unsubscribe(id));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::event::{ChatEvent, EventChannel};

/// Something that reacts to chat events.
///
/// Implemented for any `Fn(&ChatEvent)`; implement it directly for types
/// that carry their own state.
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    fn handle(&self, event: &ChatEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ChatEvent) + Send + Sync,
{
    fn handle(&self, event: &ChatEvent) {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    channel: EventChannel,
    id: u64,
}

impl SubscriptionId {
    /// Channel the subscription is on.
    pub fn channel(&self) -> EventChannel {
        self.channel
    }
}

type Subscribers = Vec<(u64, Arc<dyn EventHandler>)>;

/// Publish/subscribe hub with one subscriber list per channel.
pub struct EventBus {
    topics: [Mutex<Subscribers>; 4],
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Default::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` on `channel`.
    pub fn subscribe<H>(&self, channel: EventChannel, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        self.subscribe_shared(channel, Arc::new(handler))
    }

    /// Register an already shared handler on `channel`.
    pub fn subscribe_shared(
        &self,
        channel: EventChannel,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.topic(channel).push((id, handler));
        SubscriptionId { channel, id }
    }

    /// Register one handler on all four channels.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> Vec<SubscriptionId> {
        EventChannel::ALL
            .iter()
            .map(|&channel| self.subscribe_shared(channel, handler.clone()))
            .collect()
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut subscribers = self.topic(subscription.channel);
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != subscription.id);
        subscribers.len() != before
    }

    /// Deliver `event` to every subscriber of its channel.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &ChatEvent) -> usize {
        let snapshot: Vec<Arc<dyn EventHandler>> = self
            .topic(event.channel())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &snapshot {
            handler.handle(event);
        }
        snapshot.len()
    }

    /// Number of subscribers on `channel`.
    pub fn subscriber_count(&self, channel: EventChannel) -> usize {
        self.topic(channel).len()
    }

    fn topic(&self, channel: EventChannel) -> std::sync::MutexGuard<'_, Subscribers> {
        self.topics[channel.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("EventBus");
        for channel in EventChannel::ALL {
            d.field(&format!("{:?}", channel), &self.subscriber_count(channel));
        }
        d.finish()
    }
}
