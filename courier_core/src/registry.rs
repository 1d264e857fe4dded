//! The consumer registry maps consumer tags to the consumer handling each subscription.
//!
//! The registry sits on the path of every inbound delivery. Lookups take a shared read lock and
//! clone an `Arc`, so a hit never allocates. Registration and removal come from the channel's
//! control flow and are comparatively rare.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::consumer::{Consumer, fallback_consumer};
use crate::tag::ConsumerTag;

/// A concurrent map from [`ConsumerTag`] to [`Consumer`].
///
/// Lookups never fail: an unknown tag resolves to the default consumer when one is set and to
/// the shared [`FallbackConsumer`](crate::consumer::FallbackConsumer) otherwise.
///
/// # Locking
///
/// - All entries live behind a single `RwLock`. Deliveries only need the read side, and a single
///   lock lets [`drain`](Self::drain) take a true point-in-time snapshot of every entry.
/// - The default consumer has its own lock. It is an administrative field that is normally set
///   before traffic starts; a concurrent update is only guaranteed to be seen eventually.
/// - A poisoned lock is recovered rather than propagated. Every critical section is a single map
///   operation, so the map is never left half-updated by a panicking writer.
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: RwLock<HashMap<ConsumerTag, Arc<dyn Consumer>>>,
    default_consumer: RwLock<Option<Arc<dyn Consumer>>>,
}

impl ConsumerRegistry {
    /// Creates an empty registry without a default consumer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `consumer` for `tag`, replacing any consumer already registered for it.
    ///
    /// Returns the replaced consumer, if any.
    pub fn register(
        &self,
        tag: ConsumerTag,
        consumer: Arc<dyn Consumer>,
    ) -> Option<Arc<dyn Consumer>> {
        let previous = self.write().insert(tag.clone(), consumer);
        if previous.is_some() {
            debug!("Replaced consumer registered for tag '{}'", tag);
        } else {
            debug!("Registered consumer for tag '{}'", tag);
        }
        previous
    }

    /// Returns the consumer registered for `tag`, or the default/fallback consumer.
    #[inline]
    pub fn resolve(&self, tag: &str) -> Arc<dyn Consumer> {
        let found = self.read().get(tag).cloned();
        match found {
            Some(consumer) => consumer,
            None => self.default_or_fallback(),
        }
    }

    /// Removes and returns the consumer registered for `tag`.
    ///
    /// If nothing is registered for `tag` the default/fallback consumer is returned instead. Once
    /// this returns, `tag` no longer resolves to the removed consumer.
    pub fn take(&self, tag: &str) -> Arc<dyn Consumer> {
        let removed = self.write().remove(tag);
        match removed {
            Some(consumer) => {
                debug!("Removed consumer registered for tag '{}'", tag);
                consumer
            }
            None => self.default_or_fallback(),
        }
    }

    /// Whether a consumer is registered for `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.read().contains_key(tag)
    }

    /// The number of registered consumers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no consumer is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Atomically removes every entry and returns them.
    ///
    /// Registrations that happen after this call are not part of the returned snapshot.
    pub fn drain(&self) -> Vec<(ConsumerTag, Arc<dyn Consumer>)> {
        let consumers = std::mem::take(&mut *self.write());
        consumers.into_iter().collect()
    }

    /// Sets or clears the consumer used for unknown tags.
    pub fn set_default_consumer(&self, consumer: Option<Arc<dyn Consumer>>) {
        *self
            .default_consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = consumer;
    }

    /// The consumer used for unknown tags, if one was set.
    pub fn default_consumer(&self) -> Option<Arc<dyn Consumer>> {
        self.default_consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // Kept out of line: a miss is the uncommon case on the delivery path.
    #[cold]
    #[inline(never)]
    fn default_or_fallback(&self) -> Arc<dyn Consumer> {
        self.default_consumer().unwrap_or_else(fallback_consumer)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConsumerTag, Arc<dyn Consumer>>> {
        self.consumers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConsumerTag, Arc<dyn Consumer>>> {
        self.consumers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<ConsumerTag> = self.read().keys().cloned().collect();
        tags.sort();
        f.debug_struct("ConsumerRegistry")
            .field("tags", &tags)
            .field(
                "default_consumer",
                &self.default_consumer().as_ref().map(|_| "Some(<consumer>)"),
            )
            .finish()
    }
}
