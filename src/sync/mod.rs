//! In-process publish/subscribe channel that lets independently mounted
//! regions (sidebar, dashboard grid, layout header) follow favorites and
//! search changes without sharing a parent.
//!
//! Delivery is at-most-once and never replayed: a subscriber that arrives
//! late pulls current state from the owning store instead. Publishes on one
//! topic reach each subscriber in issue order. A subscriber that panics is
//! logged and skipped; the remaining subscribers still receive the event.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    FavoritesChanged,
    SearchQueryChanged,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::FavoritesChanged => "favorites-changed",
            Topic::SearchQueryChanged => "search-query-changed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload carried on a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "detail", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// Full, sorted favorites set after the change
    FavoritesChanged(Vec<String>),
    SearchQueryChanged(String),
}

impl SyncEvent {
    pub fn topic(&self) -> Topic {
        match self {
            SyncEvent::FavoritesChanged(_) => Topic::FavoritesChanged,
            SyncEvent::SearchQueryChanged(_) => Topic::SearchQueryChanged,
        }
    }
}

type Callback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<Topic, Vec<(u64, Callback)>>,
}

#[derive(Default)]
pub struct SyncChannel {
    registry: Mutex<Registry>,
}

impl fmt::Debug for SyncChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncChannel")
            .field("favorites_subscribers", &self.subscriber_count(Topic::FavoritesChanged))
            .field("search_subscribers", &self.subscriber_count(Topic::SearchQueryChanged))
            .finish()
    }
}

impl SyncChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Receive every later publish on `topic` until the returned handle is dropped
    pub fn subscribe<F>(self: &Arc<Self>, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .subscribers
            .entry(topic)
            .or_default()
            .push((id, Arc::new(callback)));

        tracing::debug!(topic = %topic, subscriber = id, "subscribed");

        Subscription {
            channel: Arc::downgrade(self),
            topic,
            id,
        }
    }

    pub fn subscribe_favorites<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.subscribe(Topic::FavoritesChanged, move |event| {
            if let SyncEvent::FavoritesChanged(paths) = event {
                callback(paths);
            }
        })
    }

    pub fn subscribe_search<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(Topic::SearchQueryChanged, move |event| {
            if let SyncEvent::SearchQueryChanged(query) = event {
                callback(query);
            }
        })
    }

    /// Deliver `event` to the current subscribers of its topic.
    ///
    /// Returns how many subscribers completed without panicking. Callbacks run
    /// outside the registry lock, so they may publish or unsubscribe.
    pub fn publish(&self, event: SyncEvent) -> usize {
        let topic = event.topic();
        let targets: Vec<(u64, Callback)> = self
            .lock()
            .subscribers
            .get(&topic)
            .map(|subs| subs.iter().map(|(id, cb)| (*id, Arc::clone(cb))).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(topic = %topic, subscriber = id, "subscriber panicked during dispatch");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock().subscribers.get(&topic).map(Vec::len).unwrap_or(0)
    }

    fn unsubscribe(&self, topic: Topic, id: u64) {
        let mut registry = self.lock();
        if let Some(subs) = registry.subscribers.get_mut(&topic) {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
        tracing::debug!(topic = %topic, subscriber = id, "unsubscribed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // Callbacks never run under this lock, so poisoning can only come from
        // a panic in our own bookkeeping; the registry is still consistent.
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Live subscription; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    channel: Weak<SyncChannel>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.topic, self.id);
        }
    }
}
